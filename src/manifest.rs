use crate::error::{CompileError, CompileResult};
use serde_json::{Map, Value};

/// Index of the program target inside `targets`; entry 0 is always the stage.
const PROGRAM_TARGET_INDEX: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub id: String,
    pub name: String,
    pub initial: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListDecl {
    pub id: String,
    pub name: String,
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastDecl {
    pub id: String,
    pub name: String,
}

/// The five sub-trees of a project manifest the compiler cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredManifest {
    pub variables: Vec<VariableDecl>,
    pub lists: Vec<ListDecl>,
    pub broadcasts: Vec<BroadcastDecl>,
    pub blocks: Map<String, Value>,
    pub extensions: Vec<String>,
}

impl FilteredManifest {
    pub fn variable(&self, id: &str) -> Option<&VariableDecl> {
        self.variables.iter().find(|v| v.id == id)
    }

    pub fn list(&self, id: &str) -> Option<&ListDecl> {
        self.lists.iter().find(|l| l.id == id)
    }

    pub fn block(&self, id: &str) -> CompileResult<&Value> {
        get_block(&self.blocks, id)
    }
}

/// Projects a full `project.json` tree down to the program target.
pub fn filter_manifest(project: &Value) -> CompileResult<FilteredManifest> {
    let targets = project
        .get("targets")
        .and_then(Value::as_array)
        .ok_or_else(|| CompileError::malformed("missing 'targets' array."))?;
    let target = targets.get(PROGRAM_TARGET_INDEX).ok_or_else(|| {
        CompileError::malformed(format!(
            "expected at least 2 targets, found {}.",
            targets.len()
        ))
    })?;

    let variables = required_object(target, "variables")?
        .iter()
        .map(|(id, decl)| {
            let (name, initial) = name_and_payload(id, decl, "variable")?;
            Ok(VariableDecl {
                id: id.clone(),
                name,
                initial,
            })
        })
        .collect::<CompileResult<Vec<_>>>()?;

    let lists = required_object(target, "lists")?
        .iter()
        .map(|(id, decl)| {
            let (name, items) = name_and_payload(id, decl, "list")?;
            Ok(ListDecl {
                id: id.clone(),
                name,
                items: items.as_array().cloned().unwrap_or_default(),
            })
        })
        .collect::<CompileResult<Vec<_>>>()?;

    let broadcasts = required_object(target, "broadcasts")?
        .iter()
        .map(|(id, name)| {
            let name = name.as_str().ok_or_else(|| {
                CompileError::malformed(format!("broadcast '{}' has no name.", id))
            })?;
            Ok(BroadcastDecl {
                id: id.clone(),
                name: name.to_string(),
            })
        })
        .collect::<CompileResult<Vec<_>>>()?;

    let blocks = required_object(target, "blocks")?.clone();

    let extensions = project
        .get("extensions")
        .or_else(|| target.get("extensions"))
        .and_then(Value::as_array)
        .ok_or_else(|| CompileError::malformed("missing 'extensions' array."))?
        .iter()
        .filter_map(Value::as_str)
        .map(ToString::to_string)
        .collect();

    Ok(FilteredManifest {
        variables,
        lists,
        broadcasts,
        blocks,
        extensions,
    })
}

fn required_object<'a>(target: &'a Value, key: &str) -> CompileResult<&'a Map<String, Value>> {
    target
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| CompileError::malformed(format!("program target missing '{}' object.", key)))
}

fn name_and_payload(id: &str, decl: &Value, what: &str) -> CompileResult<(String, Value)> {
    let arr = decl
        .as_array()
        .ok_or_else(|| CompileError::malformed(format!("{} '{}' is not an array.", what, id)))?;
    let name = arr
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| CompileError::malformed(format!("{} '{}' has no name.", what, id)))?;
    Ok((name.to_string(), arr.get(1).cloned().unwrap_or(Value::Null)))
}

pub(crate) fn get_block<'a>(blocks: &'a Map<String, Value>, id: &str) -> CompileResult<&'a Value> {
    blocks
        .get(id)
        .filter(|b| b.is_object())
        .ok_or_else(|| CompileError::malformed(format!("missing block '{}'.", id)))
}

pub(crate) fn block_opcode(block: &Value) -> &str {
    block.get("opcode").and_then(Value::as_str).unwrap_or("")
}

pub(crate) fn block_next(block: &Value) -> Option<&str> {
    block.get("next").and_then(Value::as_str)
}

pub(crate) fn is_top_level(block: &Value) -> bool {
    block
        .get("topLevel")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

pub(crate) fn is_shadow(block: &Value) -> bool {
    block.get("shadow").and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn block_coord(block: &Value, axis: &str) -> Option<f64> {
    block.get(axis).and_then(Value::as_f64)
}

pub(crate) fn block_inputs(block: &Value) -> Option<&Map<String, Value>> {
    block.get("inputs").and_then(Value::as_object)
}

pub(crate) fn block_fields(block: &Value) -> Option<&Map<String, Value>> {
    block.get("fields").and_then(Value::as_object)
}

pub(crate) fn block_input<'a>(block: &'a Value, input_name: &str) -> Option<&'a Value> {
    block_inputs(block).and_then(|m| m.get(input_name))
}

/// The block id driving an input slot, if any (substacks, reporters, menus).
pub(crate) fn block_input_block_id<'a>(block: &'a Value, input_name: &str) -> Option<&'a str> {
    let input_val = block_input(block, input_name)?;
    if let Some(id) = input_val.as_str() {
        return Some(id);
    }
    input_val.as_array()?.get(1)?.as_str()
}

pub(crate) fn field_first_string(block: &Value, field_name: &str) -> Option<String> {
    let value = block_fields(block)?.get(field_name)?;
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    match value.as_array()?.first()? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn field_id(block: &Value, field_name: &str) -> Option<String> {
    block_fields(block)?
        .get(field_name)?
        .as_array()?
        .get(1)?
        .as_str()
        .map(ToString::to_string)
}

/// Menus are shadow blocks carrying one field and no inputs.
pub(crate) fn menu_value(block: &Value) -> Option<String> {
    if !is_shadow(block) || block_inputs(block).is_some_and(|m| !m.is_empty()) {
        return None;
    }
    let fields = block_fields(block)?;
    if fields.len() != 1 {
        return None;
    }
    let (name, _) = fields.iter().next()?;
    field_first_string(block, name)
}
