use std::cell::RefCell;

use log::{debug, info};

use crate::assembler::{assemble, encode_number, CommandArg, Operand};
use crate::engine::Facade;
use crate::error::{BridgeError, BridgeResult};
use crate::properties::{self, PropertyValue};
use crate::registry::{TypeRegistry, Wrapper};
use crate::signatures::signature;
use crate::slots::{fragment, Operator, Slot, SlotTable};

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Upper bound on update-dispatch passes triggered by one operation.
    pub max_update_passes: usize,
    pub verbose: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        BridgeOptions {
            max_update_passes: 16,
            verbose: false,
        }
    }
}

/// Result of applying an operator to wrapped objects.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorOutcome {
    Object(Wrapper),
    Truth(bool),
}

/// The object bridge: everything scripts can do to the construction,
/// independent of the scripting runtime.
pub struct Bridge {
    facade: Facade,
    registry: TypeRegistry,
    slots: SlotTable,
    options: BridgeOptions,
    events: RefCell<Vec<String>>,
}

impl Bridge {
    pub fn new(
        facade: Facade,
        registry: TypeRegistry,
        slots: SlotTable,
        options: BridgeOptions,
    ) -> Self {
        Bridge {
            facade,
            registry,
            slots,
            options,
            events: RefCell::new(Vec::new()),
        }
    }

    pub fn standard(facade: Facade, options: BridgeOptions) -> Self {
        Bridge::new(facade, TypeRegistry::standard(), SlotTable::standard(), options)
    }

    pub fn facade(&self) -> &Facade {
        &self.facade
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    pub fn record_event(&self, event: String) {
        if self.options.verbose {
            info!("{event}");
        } else {
            debug!("{event}");
        }
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    /// Evaluates command text and wraps every new label in output order.
    pub fn eval(&self, command: &str) -> BridgeResult<Vec<Wrapper>> {
        let labels = self.facade.eval_command_get_labels(command)?;
        self.record_event(format!("command {command} -> {}", labels.join(",")));
        labels
            .iter()
            .map(|label| self.wrap_existing(label))
            .collect()
    }

    pub fn wrap_existing(&self, label: &str) -> BridgeResult<Wrapper> {
        self.registry.wrap_existing(&self.facade, label)
    }

    /// Runs a script-callable command on coerced operands.
    pub fn construct(&self, name: &str, operands: &[Operand]) -> BridgeResult<Vec<Wrapper>> {
        let signature = signature(name).ok_or_else(|| {
            BridgeError::InternalInvariant(format!("no signature registered for {name}"))
        })?;
        for operand in operands {
            if let Operand::Object(wrapper) = operand {
                self.facade.wrapped(wrapper).ensure_live()?;
            }
        }
        let args = signature.bind(operands)?;
        let command = assemble(name, &args)?;
        let wrappers = self.eval(command.as_str())?;
        if !signature.multiple_outputs && wrappers.len() != 1 {
            return Err(BridgeError::InternalInvariant(format!(
                "{command} produced {} objects, expected one",
                wrappers.len()
            )));
        }
        Ok(wrappers)
    }

    pub fn get_property(&self, wrapper: &Wrapper, name: &str) -> BridgeResult<PropertyValue> {
        let property = properties::resolve(wrapper, name)?;
        properties::read(&self.facade.wrapped(wrapper), wrapper, property)
    }

    /// Validates, then writes. Nothing reaches the engine if validation fails.
    pub fn set_property(
        &self,
        wrapper: &Wrapper,
        name: &str,
        value: PropertyValue,
    ) -> BridgeResult<()> {
        let property = properties::resolve(wrapper, name)?;
        let mutation = properties::validate(wrapper, property, &value)?;
        let object = self.facade.wrapped(wrapper);
        properties::check_writable(&object, property)?;
        properties::apply(&object, mutation)?;
        self.record_event(format!("set {}.{property}", wrapper.label()));
        Ok(())
    }

    /// Validates every pair first, then applies them in order.
    pub fn with_properties(
        &self,
        wrapper: &Wrapper,
        pairs: &[(String, PropertyValue)],
    ) -> BridgeResult<()> {
        let object = self.facade.wrapped(wrapper);
        let mutations = pairs
            .iter()
            .map(|(name, value)| {
                let property = properties::resolve(wrapper, name)?;
                let mutation = properties::validate(wrapper, property, value)?;
                properties::check_writable(&object, property)?;
                Ok((property, mutation))
            })
            .collect::<BridgeResult<Vec<_>>>()?;
        for (property, mutation) in mutations {
            properties::apply(&object, mutation)?;
            self.record_event(format!("set {}.{property}", wrapper.label()));
        }
        Ok(())
    }

    /// Independent copy of the object's current state.
    pub fn free_copy(&self, wrapper: &Wrapper) -> BridgeResult<Wrapper> {
        self.facade.wrapped(wrapper).ensure_live()?;
        let source = CommandArg::Label(wrapper.label().to_string());
        let command = assemble("CopyFreeObject", &[source])?;
        let mut copies = self.eval(command.as_str())?;
        match copies.len() {
            1 => Ok(copies.remove(0)),
            count => Err(BridgeError::InternalInvariant(format!(
                "{command} produced {count} objects"
            ))),
        }
    }

    pub fn apply_operator(
        &self,
        op: Operator,
        left: &Operand,
        right: Option<&Operand>,
    ) -> BridgeResult<OperatorOutcome> {
        let slot = self.slots.lookup(op, left, right)?;
        match slot {
            Slot::Command(build) => {
                let lhs = self.operand_fragment(left)?;
                let rhs = match right {
                    Some(operand) => self.operand_fragment(operand)?,
                    None => String::new(),
                };
                let mut outputs = self.eval(&build(&lhs, &rhs))?;
                match outputs.len() {
                    1 => Ok(OperatorOutcome::Object(outputs.remove(0))),
                    count => Err(BridgeError::InternalInvariant(format!(
                        "operator '{op}' produced {count} objects"
                    ))),
                }
            }
            Slot::Compare(compare) => {
                let right = right.ok_or_else(|| {
                    BridgeError::InternalInvariant(format!("operator '{op}' needs two operands"))
                })?;
                Ok(OperatorOutcome::Truth(compare(
                    self.numeric_operand(left)?,
                    self.numeric_operand(right)?,
                )))
            }
        }
    }

    fn operand_fragment(&self, operand: &Operand) -> BridgeResult<String> {
        if let Operand::Object(wrapper) = operand {
            self.facade.wrapped(wrapper).ensure_live()?;
        }
        fragment(operand)
    }

    fn numeric_operand(&self, operand: &Operand) -> BridgeResult<f64> {
        match operand {
            Operand::Number(value) => Ok(*value),
            Operand::Object(wrapper) => self.facade.wrapped(wrapper).numeric_value(),
            other => Err(BridgeError::type_error(format!(
                "{} is not a number",
                other.describe()
            ))),
        }
    }

    /// Deletes the object and every dependent; returns all removed labels.
    pub fn delete(&self, wrapper: &Wrapper) -> BridgeResult<Vec<String>> {
        let removed = self.facade.wrapped(wrapper).delete()?;
        self.record_event(format!("delete {}", removed.join(",")));
        Ok(removed)
    }

    /// True while the object the wrapper was made for still exists.
    pub fn is_live(&self, wrapper: &Wrapper) -> bool {
        self.facade.wrapped(wrapper).ensure_live().is_ok()
    }

    pub fn encode(&self, value: f64) -> BridgeResult<String> {
        encode_number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WrapperKind;
    use geo_construction::Construction;

    fn bridge() -> Bridge {
        Bridge::standard(Facade::from_engine(Construction::new()), BridgeOptions::default())
    }

    fn single(bridge: &Bridge, command: &str) -> Wrapper {
        let mut wrappers = bridge.eval(command).expect(command);
        assert_eq!(wrappers.len(), 1, "{command}");
        wrappers.remove(0)
    }

    #[test]
    fn rotating_a_point_yields_one_point() {
        let bridge = bridge();
        let point = single(&bridge, "A = (1, 0)");
        let angle = encode_number(30.0).unwrap();
        let rotated = bridge
            .construct("Rotate", &[Operand::Object(point.clone()), Operand::Number(30.0)])
            .expect("rotate");
        assert_eq!(rotated.len(), 1);
        assert_eq!(
            bridge.facade().get_object_type(rotated[0].label()).unwrap(),
            bridge.facade().get_object_type(point.label()).unwrap()
        );
        assert!(bridge.events().iter().any(|e| e.contains(&format!("Rotate[A,{angle}]"))));
    }

    #[test]
    fn adding_two_numerics_yields_their_sum() {
        let bridge = bridge();
        let a = single(&bridge, "a = 2.5");
        let b = single(&bridge, "b = 1.5");
        let outcome = bridge
            .apply_operator(Operator::Add, &Operand::Object(a), Some(&Operand::Object(b)))
            .unwrap();
        let OperatorOutcome::Object(sum) = outcome else {
            panic!("sum should be an object");
        };
        assert_eq!(sum.kind(), WrapperKind::Numeric);
        assert_eq!(
            bridge.get_property(&sum, "value").unwrap(),
            PropertyValue::Number(4.0)
        );
    }

    #[test]
    fn comparisons_read_values_without_creating_objects() {
        let bridge = bridge();
        let a = single(&bridge, "a = 2");
        let b = single(&bridge, "b = 3");
        let outcome = bridge
            .apply_operator(Operator::Lt, &Operand::Object(a), Some(&Operand::Object(b)))
            .unwrap();
        assert_eq!(outcome, OperatorOutcome::Truth(true));
        assert!(!bridge.facade().is_live("c"));
    }

    #[test]
    fn size_round_trips_and_rejects_out_of_range() {
        let bridge = bridge();
        let point = single(&bridge, "A = (0, 0)");
        for size in 1..=9 {
            bridge
                .set_property(&point, "size", PropertyValue::Number(f64::from(size)))
                .unwrap();
            assert_eq!(
                bridge.get_property(&point, "size").unwrap(),
                PropertyValue::Number(f64::from(size))
            );
        }
        for bad in [0.0, 10.0] {
            let err = bridge
                .set_property(&point, "size", PropertyValue::Number(bad))
                .unwrap_err();
            assert!(matches!(err, BridgeError::Validation { .. }));
        }
        assert_eq!(
            bridge.get_property(&point, "size").unwrap(),
            PropertyValue::Number(9.0)
        );
    }

    #[test]
    fn with_properties_applies_nothing_when_any_pair_is_invalid() {
        let bridge = bridge();
        let point = single(&bridge, "A = (0, 0)");
        let pairs = vec![
            ("color".to_string(), PropertyValue::Text("red".into())),
            ("size".to_string(), PropertyValue::Number(42.0)),
        ];
        assert!(bridge.with_properties(&point, &pairs).is_err());
        assert_ne!(
            bridge.get_property(&point, "color").unwrap(),
            PropertyValue::Text("#FF0000".into())
        );

        let pairs = vec![
            ("color".to_string(), PropertyValue::Text("red".into())),
            ("size".to_string(), PropertyValue::Number(7.0)),
        ];
        bridge.with_properties(&point, &pairs).unwrap();
        assert_eq!(
            bridge.get_property(&point, "color").unwrap(),
            PropertyValue::Text("#FF0000".into())
        );
    }

    #[test]
    fn derived_coordinates_are_rejected_before_other_pairs_apply() {
        let bridge = bridge();
        single(&bridge, "A = (0, 0)");
        single(&bridge, "B = (2, 2)");
        let midpoint = single(&bridge, "Midpoint[A, B]");
        let color = bridge.get_property(&midpoint, "color").unwrap();
        let pairs = vec![
            ("color".to_string(), PropertyValue::Text("red".into())),
            ("x".to_string(), PropertyValue::Number(5.0)),
        ];
        let err = bridge.with_properties(&midpoint, &pairs).unwrap_err();
        assert!(matches!(err, BridgeError::Type(_)), "{err}");
        assert_eq!(bridge.get_property(&midpoint, "color").unwrap(), color);

        let err = bridge
            .set_property(&midpoint, "y", PropertyValue::Number(1.0))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Type(_)), "{err}");
        assert_eq!(bridge.get_property(&midpoint, "y").unwrap(), PropertyValue::Number(1.0));
    }

    #[test]
    fn wrappers_of_a_deleted_object_ignore_its_reused_label() {
        let bridge = bridge();
        let old = single(&bridge, "A = (1, 2)");
        bridge.delete(&old).unwrap();
        let fresh = single(&bridge, "A = (7, 8)");
        assert_eq!(old.label(), fresh.label());
        assert!(!bridge.is_live(&old));
        assert!(bridge.is_live(&fresh));
        let err = bridge.get_property(&old, "x").unwrap_err();
        assert!(matches!(err, BridgeError::ObjectDeleted(_)));
        let err = bridge
            .set_property(&old, "x", PropertyValue::Number(0.0))
            .unwrap_err();
        assert!(matches!(err, BridgeError::ObjectDeleted(_)));
        assert_eq!(bridge.get_property(&fresh, "x").unwrap(), PropertyValue::Number(7.0));
    }

    #[test]
    fn free_copy_is_independent() {
        let bridge = bridge();
        single(&bridge, "A = (0, 0)");
        single(&bridge, "B = (2, 2)");
        let midpoint = single(&bridge, "Midpoint[A, B]");
        assert_eq!(
            bridge.get_property(&midpoint, "is_independent").unwrap(),
            PropertyValue::Bool(false)
        );
        let copy = bridge.free_copy(&midpoint).unwrap();
        assert_ne!(copy.label(), midpoint.label());
        assert_eq!(
            bridge.get_property(&copy, "is_independent").unwrap(),
            PropertyValue::Bool(true)
        );
        assert_eq!(bridge.get_property(&copy, "x").unwrap(), PropertyValue::Number(1.0));
    }

    #[test]
    fn deleted_wrappers_fail_instead_of_acting_on_stale_labels() {
        let bridge = bridge();
        let a = single(&bridge, "A = (0, 0)");
        single(&bridge, "B = (1, 1)");
        let segment = single(&bridge, "Segment[A, B]");
        let removed = bridge.delete(&a).unwrap();
        assert_eq!(removed, vec!["A".to_string(), segment.label().to_string()]);
        assert!(!bridge.is_live(&segment));
        let err = bridge.get_property(&segment, "length").unwrap_err();
        assert!(matches!(err, BridgeError::ObjectDeleted(_)));
        let err = bridge.free_copy(&a).unwrap_err();
        assert!(matches!(err, BridgeError::ObjectDeleted(_)));
    }

    #[test]
    fn construct_checks_argument_roles() {
        let bridge = bridge();
        let err = bridge
            .construct("Segment", &[Operand::Number(1.0), Operand::Number(2.0)])
            .unwrap_err();
        assert!(matches!(err, BridgeError::Type(_)));
        assert!(matches!(
            bridge.construct("Frobnicate", &[]),
            Err(BridgeError::InternalInvariant(_))
        ));
    }
}
