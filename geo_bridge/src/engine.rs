use std::cell::RefCell;
use std::rc::Rc;

use geo_construction::{Construction, Coords, EngineError, Rgb};
use log::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::registry::Wrapper;

/// Raw operations the bridge needs from a geometry engine.
pub trait GeometryEngine {
    /// Evaluates a command and returns the labels it created, in the
    /// engine's documented output order.
    fn eval_command(&mut self, command: &str) -> Result<Vec<String>, EngineError>;
    fn exists(&self, label: &str) -> bool;
    /// Creation serial of the object holding `label`; never reused, so it
    /// tells a recreated label apart from the object a wrapper was made for.
    fn serial(&self, label: &str) -> Result<u64, EngineError>;
    fn type_tag(&self, label: &str) -> Result<String, EngineError>;
    fn is_independent(&self, label: &str) -> Result<bool, EngineError>;

    fn is_visible(&self, label: &str) -> Result<bool, EngineError>;
    fn set_visible(&mut self, label: &str, visible: bool) -> Result<(), EngineError>;
    fn color(&self, label: &str) -> Result<Rgb, EngineError>;
    fn set_color(&mut self, label: &str, color: Rgb) -> Result<(), EngineError>;
    fn point_size(&self, label: &str) -> Result<u8, EngineError>;
    fn set_point_size(&mut self, label: &str, size: u8) -> Result<(), EngineError>;
    fn line_thickness(&self, label: &str) -> Result<u8, EngineError>;
    fn set_line_thickness(&mut self, label: &str, thickness: u8) -> Result<(), EngineError>;

    /// Scalar value: numbers, booleans as 0/1, segment length, polygon area.
    fn numeric_value(&self, label: &str) -> Result<f64, EngineError>;
    fn set_numeric_value(&mut self, label: &str, value: f64) -> Result<(), EngineError>;
    fn boolean_value(&self, label: &str) -> Result<bool, EngineError>;
    fn set_boolean_value(&mut self, label: &str, value: bool) -> Result<(), EngineError>;
    fn coords(&self, label: &str) -> Result<(f64, f64), EngineError>;
    fn set_coords(&mut self, label: &str, x: f64, y: f64) -> Result<(), EngineError>;
    fn radius(&self, label: &str) -> Result<f64, EngineError>;

    /// Deletes the object and its dependents; returns every removed label.
    fn delete(&mut self, label: &str) -> Result<Vec<String>, EngineError>;
    /// Labels whose value changed since the previous call.
    fn drain_updates(&mut self) -> Vec<String>;
}

impl GeometryEngine for Construction {
    fn eval_command(&mut self, command: &str) -> Result<Vec<String>, EngineError> {
        Construction::eval_command(self, command)
    }

    fn exists(&self, label: &str) -> bool {
        Construction::exists(self, label)
    }

    fn serial(&self, label: &str) -> Result<u64, EngineError> {
        Construction::serial(self, label)
    }

    fn type_tag(&self, label: &str) -> Result<String, EngineError> {
        Ok(self.object_type(label)?.tag().to_string())
    }

    fn is_independent(&self, label: &str) -> Result<bool, EngineError> {
        Construction::is_independent(self, label)
    }

    fn is_visible(&self, label: &str) -> Result<bool, EngineError> {
        Ok(self.style(label)?.visible)
    }

    fn set_visible(&mut self, label: &str, visible: bool) -> Result<(), EngineError> {
        Construction::set_visible(self, label, visible)
    }

    fn color(&self, label: &str) -> Result<Rgb, EngineError> {
        Ok(self.style(label)?.color)
    }

    fn set_color(&mut self, label: &str, color: Rgb) -> Result<(), EngineError> {
        Construction::set_color(self, label, color)
    }

    fn point_size(&self, label: &str) -> Result<u8, EngineError> {
        Ok(self.style(label)?.point_size)
    }

    fn set_point_size(&mut self, label: &str, size: u8) -> Result<(), EngineError> {
        Construction::set_point_size(self, label, size)
    }

    fn line_thickness(&self, label: &str) -> Result<u8, EngineError> {
        Ok(self.style(label)?.line_thickness)
    }

    fn set_line_thickness(&mut self, label: &str, thickness: u8) -> Result<(), EngineError> {
        Construction::set_line_thickness(self, label, thickness)
    }

    fn numeric_value(&self, label: &str) -> Result<f64, EngineError> {
        self.measure(label)
    }

    fn set_numeric_value(&mut self, label: &str, value: f64) -> Result<(), EngineError> {
        self.set_number(label, value)
    }

    fn boolean_value(&self, label: &str) -> Result<bool, EngineError> {
        self.boolean(label)
    }

    fn set_boolean_value(&mut self, label: &str, value: bool) -> Result<(), EngineError> {
        self.set_boolean(label, value)
    }

    fn coords(&self, label: &str) -> Result<(f64, f64), EngineError> {
        let coords = Construction::coords(self, label)?;
        Ok((coords.x, coords.y))
    }

    fn set_coords(&mut self, label: &str, x: f64, y: f64) -> Result<(), EngineError> {
        Construction::set_coords(self, label, Coords::new(x, y))
    }

    fn radius(&self, label: &str) -> Result<f64, EngineError> {
        Construction::radius(self, label)
    }

    fn delete(&mut self, label: &str) -> Result<Vec<String>, EngineError> {
        Construction::delete(self, label)
    }

    fn drain_updates(&mut self) -> Vec<String> {
        Construction::drain_updates(self)
    }
}

pub type SharedEngine = Rc<RefCell<dyn GeometryEngine>>;

/// Shared handle over the engine. Borrows are held only for the duration of
/// a single call so handlers fired later can reach the engine again.
#[derive(Clone)]
pub struct Facade {
    engine: SharedEngine,
}

impl Facade {
    pub fn new(engine: SharedEngine) -> Self {
        Facade { engine }
    }

    pub fn from_engine<E: GeometryEngine + 'static>(engine: E) -> Self {
        Facade::new(Rc::new(RefCell::new(engine)))
    }

    pub fn eval_command_get_labels(&self, command: &str) -> BridgeResult<Vec<String>> {
        debug!("eval {command}");
        let labels = self.engine.borrow_mut().eval_command(command)?;
        Ok(labels)
    }

    pub fn is_live(&self, label: &str) -> bool {
        self.engine.borrow().exists(label)
    }

    pub fn get_object_type(&self, label: &str) -> BridgeResult<String> {
        self.object(label).type_tag()
    }

    pub fn serial(&self, label: &str) -> BridgeResult<u64> {
        self.object(label).read(|engine, label| engine.serial(label))
    }

    pub fn drain_updates(&self) -> Vec<String> {
        self.engine.borrow_mut().drain_updates()
    }

    /// Accessors bound to whatever object holds `label` at call time.
    pub fn object<'a>(&'a self, label: &'a str) -> ObjectApi<'a> {
        ObjectApi {
            facade: self,
            label,
            serial: None,
        }
    }

    /// Accessors bound to the exact object `wrapper` was made for. They fail
    /// once it is deleted, even if its label has been given to a new object.
    pub fn wrapped<'a>(&'a self, wrapper: &'a Wrapper) -> ObjectApi<'a> {
        ObjectApi {
            facade: self,
            label: wrapper.label(),
            serial: Some(wrapper.serial()),
        }
    }
}

/// Label-bound view of the facade. Every call re-checks that the object is
/// still live before touching the engine.
pub struct ObjectApi<'a> {
    facade: &'a Facade,
    label: &'a str,
    serial: Option<u64>,
}

impl ObjectApi<'_> {
    pub fn label(&self) -> &str {
        self.label
    }

    pub fn ensure_live(&self) -> BridgeResult<()> {
        let live = match self.facade.engine.borrow().serial(self.label) {
            Ok(current) => self.serial.map_or(true, |expected| expected == current),
            Err(_) => false,
        };
        if live {
            Ok(())
        } else {
            Err(BridgeError::ObjectDeleted(self.label.to_string()))
        }
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&dyn GeometryEngine, &str) -> Result<T, EngineError>,
    ) -> BridgeResult<T> {
        self.ensure_live()?;
        let engine = self.facade.engine.borrow();
        Ok(f(&*engine, self.label)?)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut dyn GeometryEngine, &str) -> Result<T, EngineError>,
    ) -> BridgeResult<T> {
        self.ensure_live()?;
        let mut engine = self.facade.engine.borrow_mut();
        Ok(f(&mut *engine, self.label)?)
    }

    pub fn type_tag(&self) -> BridgeResult<String> {
        self.read(|engine, label| engine.type_tag(label))
    }

    pub fn is_independent(&self) -> BridgeResult<bool> {
        self.read(|engine, label| engine.is_independent(label))
    }

    pub fn is_visible(&self) -> BridgeResult<bool> {
        self.read(|engine, label| engine.is_visible(label))
    }

    pub fn set_visible(&self, visible: bool) -> BridgeResult<()> {
        self.write(|engine, label| engine.set_visible(label, visible))
    }

    pub fn color(&self) -> BridgeResult<Rgb> {
        self.read(|engine, label| engine.color(label))
    }

    pub fn set_color(&self, color: Rgb) -> BridgeResult<()> {
        self.write(|engine, label| engine.set_color(label, color))
    }

    pub fn point_size(&self) -> BridgeResult<u8> {
        self.read(|engine, label| engine.point_size(label))
    }

    pub fn set_point_size(&self, size: u8) -> BridgeResult<()> {
        self.write(|engine, label| engine.set_point_size(label, size))
    }

    pub fn line_thickness(&self) -> BridgeResult<u8> {
        self.read(|engine, label| engine.line_thickness(label))
    }

    pub fn set_line_thickness(&self, thickness: u8) -> BridgeResult<()> {
        self.write(|engine, label| engine.set_line_thickness(label, thickness))
    }

    pub fn numeric_value(&self) -> BridgeResult<f64> {
        self.read(|engine, label| engine.numeric_value(label))
    }

    pub fn set_numeric_value(&self, value: f64) -> BridgeResult<()> {
        self.write(|engine, label| engine.set_numeric_value(label, value))
    }

    pub fn boolean_value(&self) -> BridgeResult<bool> {
        self.read(|engine, label| engine.boolean_value(label))
    }

    pub fn set_boolean_value(&self, value: bool) -> BridgeResult<()> {
        self.write(|engine, label| engine.set_boolean_value(label, value))
    }

    pub fn coords(&self) -> BridgeResult<(f64, f64)> {
        self.read(|engine, label| engine.coords(label))
    }

    pub fn set_coords(&self, x: f64, y: f64) -> BridgeResult<()> {
        self.write(|engine, label| engine.set_coords(label, x, y))
    }

    pub fn radius(&self) -> BridgeResult<f64> {
        self.read(|engine, label| engine.radius(label))
    }

    pub fn delete(&self) -> BridgeResult<Vec<String>> {
        self.write(|engine, label| engine.delete(label))
    }
}
