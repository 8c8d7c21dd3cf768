use std::rc::Rc;

use anyhow::Result;
use mlua::{AnyUserData, Lua, Value, Variadic};

use crate::assembler::Operand;
use crate::error::BridgeError;
use crate::signatures::SIGNATURES;

use super::convert::{operand_from_lua, strip_module};
use super::object::{delete_object, object_to_lua, ScriptObject};
use super::{dispatch_updates, prune_listeners, HostState};

/// Installs the `ggb` global: one constructor per command signature plus
/// `eval`, `get`, `delete` and `encode`.
pub(super) fn install_ggb_module(lua: &Lua, state: Rc<HostState>) -> Result<()> {
    let globals = lua.globals();
    let ggb = lua.create_table()?;

    for signature in SIGNATURES {
        let constructor_state = state.clone();
        ggb.set(
            signature.name,
            lua.create_function(move |lua, args: Variadic<Value>| {
                let operands: Vec<Operand> =
                    strip_module(args).iter().map(operand_from_lua).collect();
                let wrappers = constructor_state.bridge.construct(signature.name, &operands)?;
                dispatch_updates(lua, &constructor_state)?;
                if signature.multiple_outputs {
                    let objects = wrappers
                        .into_iter()
                        .map(|wrapper| ScriptObject::new(wrapper, constructor_state.clone()));
                    Ok(Value::Table(lua.create_sequence_from(objects)?))
                } else {
                    let wrapper = wrappers.into_iter().next().ok_or_else(|| {
                        BridgeError::InternalInvariant(format!(
                            "{} returned no object",
                            signature.name
                        ))
                    })?;
                    object_to_lua(lua, &constructor_state, wrapper)
                }
            })?,
        )?;
    }

    let eval_state = state.clone();
    ggb.set(
        "eval",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let values = strip_module(args);
            let command = match values.first() {
                Some(Value::String(text)) => text.to_str()?.to_string(),
                other => {
                    let got = other.map_or("nothing", Value::type_name);
                    return Err(BridgeError::type_error(format!(
                        "ggb.eval expects a command string, got {got}"
                    ))
                    .into());
                }
            };
            let wrappers = eval_state.bridge.eval(&command)?;
            prune_listeners(lua, &eval_state);
            dispatch_updates(lua, &eval_state)?;
            match wrappers.len() {
                0 => Ok(Value::Nil),
                1 => object_to_lua(lua, &eval_state, wrappers[0].clone()),
                _ => {
                    let objects = wrappers
                        .into_iter()
                        .map(|wrapper| ScriptObject::new(wrapper, eval_state.clone()));
                    Ok(Value::Table(lua.create_sequence_from(objects)?))
                }
            }
        })?,
    )?;

    let get_state = state.clone();
    ggb.set(
        "get",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let values = strip_module(args);
            let label = match values.first() {
                Some(Value::String(text)) => text.to_str()?.to_string(),
                _ => return Err(BridgeError::type_error("ggb.get expects a label string").into()),
            };
            let wrapper = get_state.bridge.wrap_existing(&label)?;
            object_to_lua(lua, &get_state, wrapper)
        })?,
    )?;

    let delete_state = state.clone();
    ggb.set(
        "delete",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let values = strip_module(args);
            let wrapper = match values.first() {
                Some(Value::UserData(data)) => wrapper_of(data)?,
                _ => {
                    return Err(
                        BridgeError::type_error("ggb.delete expects a geometry object").into(),
                    )
                }
            };
            delete_object(lua, &delete_state, &wrapper)
        })?,
    )?;

    let encode_state = state;
    ggb.set(
        "encode",
        lua.create_function(move |_, args: Variadic<Value>| {
            let values = strip_module(args);
            let value = match values.first() {
                Some(Value::Number(n)) => *n,
                Some(Value::Integer(i)) => *i as f64,
                other => {
                    let got = other.map_or("nothing", Value::type_name);
                    return Err(BridgeError::type_error(format!(
                        "ggb.encode expects a number, got {got}"
                    ))
                    .into());
                }
            };
            Ok(encode_state.bridge.encode(value)?)
        })?,
    )?;

    globals.set("ggb", ggb)?;
    Ok(())
}

fn wrapper_of(data: &AnyUserData) -> mlua::Result<crate::registry::Wrapper> {
    let object = data
        .borrow::<ScriptObject>()
        .map_err(|_| BridgeError::type_error("expected a geometry object"))?;
    Ok(object.wrapper().clone())
}
