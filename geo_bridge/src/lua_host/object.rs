use std::rc::Rc;

use mlua::{
    AnyUserData, Function, Lua, MetaMethod, Result as LuaResult, Table, UserData, UserDataMethods,
    Value,
};

use crate::assembler::Operand;
use crate::bridge::OperatorOutcome;
use crate::error::BridgeError;
use crate::registry::Wrapper;
use crate::slots::Operator;

use super::convert::{
    operand_from_lua, property_pairs, property_value_from_lua, property_value_to_lua,
};
use super::{dispatch_updates, HostState, ListenerEntry};

/// Lua userdata for one wrapped engine object.
#[derive(Clone)]
pub(crate) struct ScriptObject {
    wrapper: Wrapper,
    state: Rc<HostState>,
}

impl ScriptObject {
    pub(crate) fn new(wrapper: Wrapper, state: Rc<HostState>) -> Self {
        ScriptObject { wrapper, state }
    }

    pub(crate) fn wrapper(&self) -> &Wrapper {
        &self.wrapper
    }
}

impl UserData for ScriptObject {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_method("free_copy", |lua, this, ()| {
            let copy = this.state.bridge.free_copy(&this.wrapper)?;
            dispatch_updates(lua, &this.state)?;
            Ok(ScriptObject::new(copy, this.state.clone()))
        });

        methods.add_function(
            "with_properties",
            |lua, (data, properties): (AnyUserData, Table)| {
                let (wrapper, state) = {
                    let this = data.borrow::<ScriptObject>()?;
                    (this.wrapper.clone(), this.state.clone())
                };
                let pairs = property_pairs(&properties)?;
                state.bridge.with_properties(&wrapper, &pairs)?;
                dispatch_updates(lua, &state)?;
                Ok(data)
            },
        );

        methods.add_method("when_updated", |lua, this, handler: Function| {
            let label = this.wrapper.label();
            this.state.bridge.facade().wrapped(&this.wrapper).ensure_live()?;
            let key = lua.create_registry_value(handler)?;
            let count = this.state.listeners.borrow_mut().register(
                label,
                ListenerEntry {
                    wrapper: this.wrapper.clone(),
                    function: Rc::new(key),
                },
            );
            this.state
                .bridge
                .record_event(format!("listener.add {label} ({count})"));
            Ok(count)
        });

        methods.add_method("delete", |lua, this, ()| {
            delete_object(lua, &this.state, &this.wrapper)
        });

        methods.add_method("is_live", |_, this, ()| Ok(this.state.bridge.is_live(&this.wrapper)));

        methods.add_meta_method(MetaMethod::Index, |lua, this, key: String| {
            let value = this.state.bridge.get_property(&this.wrapper, &key)?;
            property_value_to_lua(lua, value)
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (key, value): (String, Value)| {
                let value = property_value_from_lua(&key, &value)?;
                this.state.bridge.set_property(&this.wrapper, &key, value)?;
                dispatch_updates(lua, &this.state)?;
                Ok(())
            },
        );

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.wrapper.to_string()));

        methods.add_meta_function(MetaMethod::Add, |lua, (lhs, rhs): (Value, Value)| {
            binary_operator(lua, Operator::Add, lhs, rhs)
        });
        methods.add_meta_function(MetaMethod::Sub, |lua, (lhs, rhs): (Value, Value)| {
            binary_operator(lua, Operator::Sub, lhs, rhs)
        });
        methods.add_meta_function(MetaMethod::Mul, |lua, (lhs, rhs): (Value, Value)| {
            binary_operator(lua, Operator::Mul, lhs, rhs)
        });
        methods.add_meta_function(MetaMethod::Div, |lua, (lhs, rhs): (Value, Value)| {
            binary_operator(lua, Operator::Div, lhs, rhs)
        });
        methods.add_meta_function(MetaMethod::Pow, |lua, (lhs, rhs): (Value, Value)| {
            binary_operator(lua, Operator::Pow, lhs, rhs)
        });
        methods.add_meta_function(MetaMethod::Eq, |lua, (lhs, rhs): (Value, Value)| {
            binary_operator(lua, Operator::Eq, lhs, rhs)
        });
        methods.add_meta_function(MetaMethod::Lt, |lua, (lhs, rhs): (Value, Value)| {
            binary_operator(lua, Operator::Lt, lhs, rhs)
        });
        methods.add_meta_function(MetaMethod::Le, |lua, (lhs, rhs): (Value, Value)| {
            binary_operator(lua, Operator::Le, lhs, rhs)
        });

        // Lua 5.1 passes the operand twice to __unm.
        methods.add_meta_method(MetaMethod::Unm, |lua, this, ()| {
            let outcome = this.state.bridge.apply_operator(
                Operator::Neg,
                &Operand::Object(this.wrapper.clone()),
                None,
            )?;
            outcome_to_lua(lua, &this.state, outcome)
        });
    }
}

fn host_state_of(value: &Value) -> Option<Rc<HostState>> {
    match value {
        Value::UserData(data) => data
            .borrow::<ScriptObject>()
            .ok()
            .map(|object| object.state.clone()),
        _ => None,
    }
}

fn binary_operator<'lua>(
    lua: &'lua Lua,
    op: Operator,
    lhs: Value<'lua>,
    rhs: Value<'lua>,
) -> LuaResult<Value<'lua>> {
    let state = host_state_of(&lhs)
        .or_else(|| host_state_of(&rhs))
        .ok_or_else(|| {
            BridgeError::InternalInvariant(format!(
                "operator '{op}' dispatched without a wrapped operand"
            ))
        })?;
    let left = operand_from_lua(&lhs);
    let right = operand_from_lua(&rhs);
    let outcome = state.bridge.apply_operator(op, &left, Some(&right))?;
    outcome_to_lua(lua, &state, outcome)
}

fn outcome_to_lua<'lua>(
    lua: &'lua Lua,
    state: &Rc<HostState>,
    outcome: OperatorOutcome,
) -> LuaResult<Value<'lua>> {
    match outcome {
        OperatorOutcome::Truth(flag) => Ok(Value::Boolean(flag)),
        OperatorOutcome::Object(wrapper) => {
            dispatch_updates(lua, state)?;
            object_to_lua(lua, state, wrapper)
        }
    }
}

pub(super) fn object_to_lua<'lua>(
    lua: &'lua Lua,
    state: &Rc<HostState>,
    wrapper: Wrapper,
) -> LuaResult<Value<'lua>> {
    let data = lua.create_userdata(ScriptObject::new(wrapper, state.clone()))?;
    Ok(Value::UserData(data))
}

/// Deletes the object, drops handler lists of everything removed and runs
/// any pending updates. Returns how many objects were removed.
pub(super) fn delete_object(
    lua: &Lua,
    state: &Rc<HostState>,
    wrapper: &Wrapper,
) -> LuaResult<usize> {
    let removed = state.bridge.delete(wrapper)?;
    {
        let mut listeners = state.listeners.borrow_mut();
        for label in &removed {
            listeners.forget(label);
        }
    }
    lua.expire_registry_values();
    dispatch_updates(lua, state)?;
    Ok(removed.len())
}
