use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::error::EngineError;
use crate::expr::{parse_statement, Expr, Scope};
use crate::labels::{is_valid_label, next_free_label};
use crate::object::{
    Coords, Definition, GeoObject, ObjectType, Rgb, Style, Value, LINE_THICKNESS_RANGE,
    POINT_SIZE_RANGE,
};

/// Live construction: every object, in creation order, plus the queue of
/// labels whose value changed since the last [`Construction::drain_updates`].
#[derive(Debug, Default)]
pub struct Construction {
    objects: HashMap<String, GeoObject>,
    order: Vec<String>,
    pending_updates: Vec<String>,
    last_serial: u64,
}

impl Scope for Construction {
    fn lookup(&self, label: &str) -> Result<Value, EngineError> {
        self.object(label)?
            .value
            .clone()
            .ok_or_else(|| EngineError::Undefined(label.to_string()))
    }
}

impl Construction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates one input line and returns the labels it created, in output
    /// order. `Delete[...]` returns no labels.
    pub fn eval_command(&mut self, input: &str) -> Result<Vec<String>, EngineError> {
        let statement = parse_statement(input)?;
        if let Expr::Call { name, args } = &statement.expr {
            match name.as_str() {
                "Delete" => {
                    let label = label_argument(name, args)?;
                    self.delete(&label)?;
                    return Ok(Vec::new());
                }
                "CopyFreeObject" => {
                    let [source] = args.as_slice() else {
                        return Err(EngineError::invalid_arguments(name, "expects one object"));
                    };
                    return self.copy_free(statement.label, source).map(|label| vec![label]);
                }
                _ => {}
            }
        }

        let mut outputs = statement.expr.eval_outputs(&*self)?;
        if outputs.is_empty() {
            return Err(EngineError::Evaluation(format!("{} creates no objects", statement.expr)));
        }
        let dependencies = statement.expr.labels();

        if let Some(label) = statement.label.as_deref() {
            if outputs.len() > 1 {
                return Err(EngineError::Evaluation(format!(
                    "cannot name {} results with the single label {label}",
                    outputs.len()
                )));
            }
            if !is_valid_label(label) {
                return Err(EngineError::Syntax {
                    position: 0,
                    message: format!("invalid label {label}"),
                });
            }
            if let Some(existing) = self.objects.get(label) {
                let same_type = existing.object_type == outputs[0].object_type();
                if existing.is_independent() && dependencies.is_empty() && same_type {
                    self.set_free_value(label, outputs.remove(0))?;
                    return Ok(vec![label.to_string()]);
                }
                return Err(EngineError::LabelInUse(label.to_string()));
            }
        }

        let mut created = Vec::with_capacity(outputs.len());
        for (index, value) in outputs.into_iter().enumerate() {
            let object_type = value.object_type();
            let label = match (&statement.label, index) {
                (Some(label), 0) => label.clone(),
                _ => self.next_label(object_type),
            };
            let serial = self.next_serial();
            let definition = if dependencies.is_empty() {
                Definition::Free
            } else {
                Definition::Derived {
                    expr: statement.expr.clone(),
                    output: index,
                    dependencies: dependencies.clone(),
                }
            };
            self.insert(GeoObject {
                label: label.clone(),
                serial,
                object_type,
                value: Some(value),
                style: Style::for_type(object_type),
                definition,
            });
            created.push(label);
        }
        Ok(created)
    }

    pub fn exists(&self, label: &str) -> bool {
        self.objects.contains_key(label)
    }

    pub fn object(&self, label: &str) -> Result<&GeoObject, EngineError> {
        self.objects
            .get(label)
            .ok_or_else(|| EngineError::UnknownLabel(label.to_string()))
    }

    fn object_mut(&mut self, label: &str) -> Result<&mut GeoObject, EngineError> {
        self.objects
            .get_mut(label)
            .ok_or_else(|| EngineError::UnknownLabel(label.to_string()))
    }

    pub fn object_type(&self, label: &str) -> Result<ObjectType, EngineError> {
        Ok(self.object(label)?.object_type)
    }

    /// Labels in creation order.
    /// Creation serial of the live object currently holding `label`.
    pub fn serial(&self, label: &str) -> Result<u64, EngineError> {
        Ok(self.object(label)?.serial)
    }

    pub fn labels(&self) -> &[String] {
        &self.order
    }

    pub fn is_independent(&self, label: &str) -> Result<bool, EngineError> {
        Ok(self.object(label)?.is_independent())
    }

    pub fn style(&self, label: &str) -> Result<&Style, EngineError> {
        Ok(&self.object(label)?.style)
    }

    pub fn set_visible(&mut self, label: &str, visible: bool) -> Result<(), EngineError> {
        self.object_mut(label)?.style.visible = visible;
        Ok(())
    }

    pub fn set_color(&mut self, label: &str, color: Rgb) -> Result<(), EngineError> {
        self.object_mut(label)?.style.color = color;
        Ok(())
    }

    pub fn set_point_size(&mut self, label: &str, size: u8) -> Result<(), EngineError> {
        if !POINT_SIZE_RANGE.contains(&size) {
            return Err(EngineError::AttributeRange {
                label: label.to_string(),
                attribute: "point size",
                value: i64::from(size),
            });
        }
        self.object_mut(label)?.style.point_size = size;
        Ok(())
    }

    pub fn set_line_thickness(&mut self, label: &str, thickness: u8) -> Result<(), EngineError> {
        if !LINE_THICKNESS_RANGE.contains(&thickness) {
            return Err(EngineError::AttributeRange {
                label: label.to_string(),
                attribute: "line thickness",
                value: i64::from(thickness),
            });
        }
        self.object_mut(label)?.style.line_thickness = thickness;
        Ok(())
    }

    pub fn value(&self, label: &str) -> Result<&Value, EngineError> {
        self.object(label)?
            .value
            .as_ref()
            .ok_or_else(|| EngineError::Undefined(label.to_string()))
    }

    /// Scalar value: numbers, booleans (0/1), segment length, polygon area.
    pub fn measure(&self, label: &str) -> Result<f64, EngineError> {
        self.value(label)?
            .measure()
            .ok_or_else(|| EngineError::MissingAttribute {
                label: label.to_string(),
                attribute: "numeric value",
            })
    }

    pub fn boolean(&self, label: &str) -> Result<bool, EngineError> {
        match self.value(label)? {
            Value::Boolean { value } => Ok(*value),
            _ => Err(EngineError::MissingAttribute {
                label: label.to_string(),
                attribute: "boolean value",
            }),
        }
    }

    pub fn coords(&self, label: &str) -> Result<Coords, EngineError> {
        match self.value(label)? {
            Value::Point(p) | Value::Vector(p) => Ok(*p),
            _ => Err(EngineError::MissingAttribute {
                label: label.to_string(),
                attribute: "coordinates",
            }),
        }
    }

    pub fn radius(&self, label: &str) -> Result<f64, EngineError> {
        match self.value(label)? {
            Value::Circle { radius, .. } => Ok(*radius),
            _ => Err(EngineError::MissingAttribute {
                label: label.to_string(),
                attribute: "radius",
            }),
        }
    }

    pub fn set_coords(&mut self, label: &str, coords: Coords) -> Result<(), EngineError> {
        let value = match self.object_type(label)? {
            ObjectType::Point => Value::Point(coords),
            ObjectType::Vector => Value::Vector(coords),
            _ => {
                return Err(EngineError::MissingAttribute {
                    label: label.to_string(),
                    attribute: "coordinates",
                })
            }
        };
        self.set_free_value(label, value)
    }

    pub fn set_number(&mut self, label: &str, value: f64) -> Result<(), EngineError> {
        self.set_free_value(label, Value::number(value))
    }

    pub fn set_boolean(&mut self, label: &str, value: bool) -> Result<(), EngineError> {
        self.set_free_value(label, Value::boolean(value))
    }

    /// Replaces the value of a free object and recomputes its dependents.
    pub fn set_free_value(&mut self, label: &str, value: Value) -> Result<(), EngineError> {
        let object = self.object_mut(label)?;
        if !object.is_independent() {
            return Err(EngineError::NotFree(label.to_string()));
        }
        if object.object_type != value.object_type() {
            return Err(EngineError::Evaluation(format!(
                "cannot assign a {} to {} {label}",
                value.object_type(),
                object.object_type
            )));
        }
        object.value = Some(value);
        self.propagate(label);
        Ok(())
    }

    /// Deletes `label` and everything that depends on it. Returns the
    /// removed labels in creation order.
    pub fn delete(&mut self, label: &str) -> Result<Vec<String>, EngineError> {
        self.object(label)?;
        let mut doomed: Vec<String> = vec![label.to_string()];
        for candidate in &self.order {
            if candidate == label {
                continue;
            }
            let object = &self.objects[candidate];
            if doomed.iter().any(|dead| object.definition.depends_on(dead)) {
                doomed.push(candidate.clone());
            }
        }
        for dead in &doomed {
            self.objects.remove(dead);
        }
        self.order.retain(|label| !doomed.contains(label));
        self.pending_updates.retain(|label| !doomed.contains(label));
        Ok(doomed)
    }

    /// Labels changed since the previous drain, each listed once, in the
    /// order they changed.
    pub fn drain_updates(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_updates)
    }

    pub fn snapshot(&self) -> ConstructionSnapshot {
        let objects = self
            .order
            .iter()
            .map(|label| {
                let object = &self.objects[label];
                ObjectSnapshot {
                    label: label.clone(),
                    object_type: object.object_type,
                    value: object.value.clone(),
                    independent: object.is_independent(),
                    definition: match &object.definition {
                        Definition::Free => None,
                        Definition::Derived { expr, .. } => Some(expr.to_string()),
                    },
                    style: object.style.clone(),
                }
            })
            .collect();
        ConstructionSnapshot { objects }
    }

    pub fn write_snapshot_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())
            .context("serializing construction snapshot to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("writing construction snapshot to {}", path.display()))?;
        Ok(())
    }

    fn insert(&mut self, object: GeoObject) {
        self.order.push(object.label.clone());
        self.objects.insert(object.label.clone(), object);
    }

    fn next_serial(&mut self) -> u64 {
        self.last_serial += 1;
        self.last_serial
    }

    fn next_label(&self, kind: ObjectType) -> String {
        next_free_label(kind, |candidate| self.objects.contains_key(candidate))
    }

    fn copy_free(
        &mut self,
        requested: Option<String>,
        source: &Expr,
    ) -> Result<String, EngineError> {
        let value = source.eval(&*self)?;
        let object_type = value.object_type();
        let style = match source {
            Expr::Label(label) => self.style(label)?.clone(),
            _ => Style::for_type(object_type),
        };
        let label = match requested {
            Some(label) if self.exists(&label) => return Err(EngineError::LabelInUse(label)),
            Some(label) if !is_valid_label(&label) => {
                return Err(EngineError::Syntax {
                    position: 0,
                    message: format!("invalid label {label}"),
                })
            }
            Some(label) => label,
            None => self.next_label(object_type),
        };
        let serial = self.next_serial();
        self.insert(GeoObject {
            label: label.clone(),
            serial,
            object_type,
            value: Some(value),
            style,
            definition: Definition::Free,
        });
        Ok(label)
    }

    /// Recomputes every object downstream of `origin` in creation order and
    /// queues one update per changed label.
    fn propagate(&mut self, origin: &str) {
        let mut changed = vec![origin.to_string()];
        let Some(start) = self.order.iter().position(|label| label == origin) else {
            return;
        };
        let downstream: Vec<String> = self.order[start + 1..].to_vec();
        for label in downstream {
            let (expr, output, object_type) = match &self.objects[&label] {
                GeoObject {
                    definition:
                        Definition::Derived {
                            expr,
                            output,
                            dependencies,
                        },
                    object_type,
                    ..
                } if dependencies.iter().any(|dep| changed.contains(dep)) => {
                    (expr.clone(), *output, *object_type)
                }
                _ => continue,
            };
            let value = expr
                .eval_outputs(&*self)
                .ok()
                .and_then(|mut values| (output < values.len()).then(|| values.swap_remove(output)))
                .filter(|value| value.object_type() == object_type);
            if let Some(object) = self.objects.get_mut(&label) {
                object.value = value;
            }
            changed.push(label);
        }
        for label in changed {
            if !self.pending_updates.contains(&label) {
                self.pending_updates.push(label);
            }
        }
    }
}

fn label_argument(command: &str, args: &[Expr]) -> Result<String, EngineError> {
    match args {
        [Expr::Label(label)] => Ok(label.clone()),
        _ => Err(EngineError::invalid_arguments(command, "expects one object label")),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstructionSnapshot {
    pub objects: Vec<ObjectSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectSnapshot {
    pub label: String,
    pub object_type: ObjectType,
    pub value: Option<Value>,
    pub independent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    pub style: Style,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn construction_with_points() -> Construction {
        let mut construction = Construction::new();
        construction.eval_command("A = (1, 0)").expect("A");
        construction.eval_command("B = (3, 0)").expect("B");
        construction
    }

    #[test]
    fn free_points_are_independent_and_derived_objects_are_not() {
        let mut construction = construction_with_points();
        let labels = construction.eval_command("Segment[A, B]").expect("segment");
        assert_eq!(labels, vec!["a".to_string()]);
        assert!(construction.is_independent("A").unwrap());
        assert!(!construction.is_independent("a").unwrap());
        assert_eq!(construction.measure("a").unwrap(), 2.0);
    }

    #[test]
    fn rotate_keeps_type_and_creates_one_label() {
        let mut construction = construction_with_points();
        let labels = construction
            .eval_command("Rotate[A, (3*10^(1))]")
            .expect("rotated");
        assert_eq!(labels.len(), 1);
        assert_eq!(construction.object_type(&labels[0]).unwrap(), ObjectType::Point);
    }

    #[test]
    fn moving_a_free_point_updates_dependents_in_order() {
        let mut construction = construction_with_points();
        construction.eval_command("M = Midpoint[A, B]").expect("midpoint");
        construction.eval_command("d = Distance[A, M]").expect("distance");
        construction.eval_command("C = (9, 9)").expect("unrelated");
        assert!(construction.drain_updates().is_empty());

        construction.set_coords("A", Coords::new(-1.0, 0.0)).unwrap();
        assert_eq!(construction.coords("M").unwrap(), Coords::new(1.0, 0.0));
        assert_eq!(construction.measure("d").unwrap(), 2.0);
        assert_eq!(
            construction.drain_updates(),
            vec!["A".to_string(), "M".to_string(), "d".to_string()]
        );
        assert!(construction.drain_updates().is_empty());
    }

    #[test]
    fn delete_cascades_to_dependents() {
        let mut construction = construction_with_points();
        construction.eval_command("s = Segment[A, B]").expect("segment");
        construction.eval_command("M = Midpoint[s]").expect("midpoint");
        construction.eval_command("Delete[A]").expect("deleted");
        assert!(!construction.exists("A"));
        assert!(!construction.exists("s"));
        assert!(!construction.exists("M"));
        assert!(construction.exists("B"));
    }

    #[test]
    fn dependent_objects_cannot_be_set_directly() {
        let mut construction = construction_with_points();
        construction.eval_command("M = Midpoint[A, B]").expect("midpoint");
        let err = construction.set_coords("M", Coords::ORIGIN).unwrap_err();
        assert_eq!(err, EngineError::NotFree("M".to_string()));
    }

    #[test]
    fn copy_free_object_duplicates_value_and_style() {
        let mut construction = construction_with_points();
        construction.eval_command("M = Midpoint[A, B]").expect("midpoint");
        construction.set_point_size("M", 8).unwrap();
        let labels = construction.eval_command("CopyFreeObject[M]").expect("copy");
        let copy = &labels[0];
        assert!(construction.is_independent(copy).unwrap());
        assert_eq!(construction.coords(copy).unwrap(), Coords::new(2.0, 0.0));
        assert_eq!(construction.style(copy).unwrap().point_size, 8);
    }

    #[test]
    fn intersect_returns_labels_in_output_order() {
        let mut construction = Construction::new();
        construction.eval_command("O = (0, 0)").unwrap();
        construction.eval_command("c = Circle[O, 2]").unwrap();
        construction.eval_command("P = (-5, 0)").unwrap();
        construction.eval_command("Q = (5, 0)").unwrap();
        construction.eval_command("l = Line[P, Q]").unwrap();
        let labels = construction.eval_command("Intersect[l, c]").expect("intersect");
        assert_eq!(labels.len(), 2);
        for label in &labels {
            assert_eq!(construction.object_type(label).unwrap(), ObjectType::Point);
        }
    }

    #[test]
    fn redefining_a_free_label_keeps_identity() {
        let mut construction = Construction::new();
        construction.eval_command("a = 2").unwrap();
        construction.eval_command("b = a + 1").unwrap();
        construction.drain_updates();
        let labels = construction.eval_command("a = 5").unwrap();
        assert_eq!(labels, vec!["a".to_string()]);
        assert_eq!(construction.measure("b").unwrap(), 6.0);
        assert_eq!(construction.drain_updates(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn out_of_range_style_values_are_rejected() {
        let mut construction = construction_with_points();
        assert!(construction.set_point_size("A", 10).is_err());
        assert!(construction.set_line_thickness("A", 0).is_err());
        assert!(construction.set_point_size("A", 9).is_ok());
    }

    #[test]
    fn snapshot_lists_objects_in_creation_order() {
        let mut construction = construction_with_points();
        construction.eval_command("Segment[A, B]").unwrap();
        let snapshot = construction.snapshot();
        let labels: Vec<&str> = snapshot.objects.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "a"]);
        assert_eq!(snapshot.objects[2].definition.as_deref(), Some("Segment[A, B]"));
        let json = serde_json::to_string(&snapshot).expect("serializes");
        assert!(json.contains("\"object_type\":\"segment\""));
    }

    #[test]
    fn reused_labels_get_fresh_serials() {
        let mut construction = Construction::new();
        let first = construction.eval_command("(1, 2)").unwrap();
        let old_serial = construction.serial(&first[0]).unwrap();
        construction.delete(&first[0]).unwrap();
        let second = construction.eval_command("(7, 8)").unwrap();
        assert_eq!(first, second);
        assert_ne!(construction.serial(&second[0]).unwrap(), old_serial);

        construction.eval_command("A = (3, 4)").unwrap();
        let serial = construction.serial("A").unwrap();
        construction.eval_command("A = (5, 6)").unwrap();
        assert_eq!(construction.serial("A").unwrap(), serial);
    }
}
