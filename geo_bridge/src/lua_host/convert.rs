use mlua::{Lua, Result as LuaResult, Table, Value, Variadic};

use crate::assembler::Operand;
use crate::error::{BridgeError, BridgeResult};
use crate::properties::PropertyValue;

use super::object::ScriptObject;

/// Drops a leading module table so `ggb:Point(1, 2)` behaves like
/// `ggb.Point(1, 2)`.
pub(super) fn strip_module(args: Variadic<Value>) -> Vec<Value> {
    let mut iter = args.into_iter();
    match iter.next() {
        Some(Value::Table(_)) => iter.collect(),
        Some(value) => {
            let mut values = vec![value];
            values.extend(iter);
            values
        }
        None => Vec::new(),
    }
}

pub(super) fn operand_from_lua(value: &Value) -> Operand {
    match value {
        Value::Boolean(flag) => Operand::Bool(*flag),
        Value::Integer(i) => Operand::Number(*i as f64),
        Value::Number(n) => Operand::Number(*n),
        Value::String(text) => match text.to_str() {
            Ok(text) => Operand::Text(text.to_string()),
            Err(_) => Operand::Other("string"),
        },
        Value::UserData(data) => match data.borrow::<ScriptObject>() {
            Ok(object) => Operand::Object(object.wrapper().clone()),
            Err(_) => Operand::Other("userdata"),
        },
        other => Operand::Other(other.type_name()),
    }
}

pub(super) fn property_value_from_lua(
    property: &str,
    value: &Value,
) -> BridgeResult<PropertyValue> {
    match value {
        Value::Boolean(flag) => Ok(PropertyValue::Bool(*flag)),
        Value::Integer(i) => Ok(PropertyValue::Number(*i as f64)),
        Value::Number(n) => Ok(PropertyValue::Number(*n)),
        Value::String(text) => text
            .to_str()
            .map(|text| PropertyValue::Text(text.to_string()))
            .map_err(|_| {
                BridgeError::type_error(format!("property '{property}' needs valid UTF-8 text"))
            }),
        other => Err(BridgeError::type_error(format!(
            "property '{property}' cannot be set to a {}",
            other.type_name()
        ))),
    }
}

pub(super) fn property_value_to_lua<'lua>(
    lua: &'lua Lua,
    value: PropertyValue,
) -> LuaResult<Value<'lua>> {
    Ok(match value {
        PropertyValue::Bool(flag) => Value::Boolean(flag),
        PropertyValue::Number(n) => Value::Number(n),
        PropertyValue::Text(text) => Value::String(lua.create_string(&text)?),
    })
}

/// Reads `with_properties` arguments into one ordered list.
///
/// Array entries `{name, value}` keep their index order; keyed entries
/// (`{size = 3}`) follow, sorted by name since Lua tables are unordered.
pub(super) fn property_pairs(table: &Table) -> LuaResult<Vec<(String, PropertyValue)>> {
    let mut positional: Vec<(i64, String, PropertyValue)> = Vec::new();
    let mut named: Vec<(String, PropertyValue)> = Vec::new();

    for entry in table.clone().pairs::<Value, Value>() {
        let (key, value) = entry?;
        match key {
            Value::String(name) => {
                let name = name.to_str()?.to_string();
                let value = property_value_from_lua(&name, &value)?;
                named.push((name, value));
            }
            Value::Integer(index) => positional.push(positional_pair(index, &value)?),
            Value::Number(index) if index.fract() == 0.0 => {
                positional.push(positional_pair(index as i64, &value)?)
            }
            other => {
                return Err(BridgeError::type_error(format!(
                    "with_properties keys must be property names, got {}",
                    other.type_name()
                ))
                .into())
            }
        }
    }

    positional.sort_by_key(|(index, _, _)| *index);
    named.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(positional
        .into_iter()
        .map(|(_, name, value)| (name, value))
        .chain(named)
        .collect())
}

fn positional_pair(index: i64, value: &Value) -> LuaResult<(i64, String, PropertyValue)> {
    let malformed = || {
        BridgeError::type_error(format!(
            "with_properties entry {index} must be a {{name, value}} pair"
        ))
    };
    let Value::Table(pair) = value else {
        return Err(malformed().into());
    };
    let name: Value = pair.get(1)?;
    let Value::String(name) = name else {
        return Err(malformed().into());
    };
    let name = name.to_str()?.to_string();
    let value: Value = pair.get(2)?;
    let value = property_value_from_lua(&name, &value)?;
    Ok((index, name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_and_positional_pairs_are_ordered() {
        let lua = Lua::new();
        let table: Table = lua
            .load(r#"{ {"size", 3}, {"color", "red"}, line_thickness = 4, is_visible = false }"#)
            .eval()
            .expect("table literal");
        let pairs = property_pairs(&table).expect("pairs");
        let names: Vec<&str> = pairs.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["size", "color", "is_visible", "line_thickness"]);
        assert_eq!(pairs[2].1, PropertyValue::Bool(false));
    }

    #[test]
    fn malformed_pairs_are_type_errors() {
        let lua = Lua::new();
        let table: Table = lua.load(r#"{ "size" }"#).eval().expect("table literal");
        let err = property_pairs(&table).unwrap_err();
        assert!(matches!(
            crate::error::bridge_error(&err),
            Some(BridgeError::Type(_))
        ));
    }

    #[test]
    fn tables_cannot_be_property_values() {
        let lua = Lua::new();
        let value: Value = lua.load("{}").eval().expect("table");
        assert!(property_value_from_lua("color", &value).is_err());
    }
}
