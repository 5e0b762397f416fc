#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const PORT_MENU: &str = "flippermotor_multiple-port-selector";
pub const PORT_FIELD: &str = "field_flippermotor_multiple-port-selector";

/// Wraps a block map into a two-target project.json tree.
pub fn project(blocks: Value) -> Value {
    json!({
        "targets": [
            {
                "isStage": true,
                "name": "Stage",
                "variables": {},
                "lists": {},
                "broadcasts": {},
                "blocks": {}
            },
            {
                "isStage": false,
                "name": "Hub",
                "variables": {"var1": ["speed", 50]},
                "lists": {"list1": ["my_list", ["A"]]},
                "broadcasts": {"msg1": "message1"},
                "blocks": blocks
            }
        ],
        "extensions": ["flipperevents", "flippermotor", "flipperlight"],
        "meta": {"semver": "3.0.0"}
    })
}

/// Builds a block map from `(id, block)` pairs, keeping their order.
pub fn blocks(entries: Vec<(&str, Value)>) -> Value {
    let mut map = Map::new();
    for (id, block) in entries {
        map.insert(id.to_string(), block);
    }
    Value::Object(map)
}

pub fn hat(next: Option<&str>) -> Value {
    json!({
        "opcode": "flipperevents_whenProgramStarts",
        "next": next,
        "parent": null,
        "inputs": {},
        "fields": {},
        "shadow": false,
        "topLevel": true,
        "x": 12,
        "y": 34
    })
}

pub fn block(opcode: &str, parent: &str, next: Option<&str>, inputs: Value, fields: Value) -> Value {
    json!({
        "opcode": opcode,
        "next": next,
        "parent": parent,
        "inputs": inputs,
        "fields": fields,
        "shadow": false,
        "topLevel": false
    })
}

pub fn menu(opcode: &str, field: &str, value: &str, parent: &str) -> Value {
    json!({
        "opcode": opcode,
        "next": null,
        "parent": parent,
        "inputs": {},
        "fields": {field: [value, null]},
        "shadow": true,
        "topLevel": false
    })
}

pub fn port_menu(letters: &str, parent: &str) -> Value {
    menu(PORT_MENU, PORT_FIELD, letters, parent)
}

pub fn num(value: &str) -> Value {
    json!([1, [4, value]])
}

pub fn text(value: &str) -> Value {
    json!([1, [10, value]])
}

/// A slot driven by a menu or reporter block.
pub fn slot(id: &str) -> Value {
    json!([1, id])
}

/// A reporter dropped over a numeric shadow.
pub fn reporter(id: &str) -> Value {
    json!([3, id, [4, "0"]])
}

pub fn substack(id: &str) -> Value {
    json!([2, id])
}

pub fn field(value: &str) -> Value {
    json!([value, null])
}

/// The smallest runnable program: spin motor A one rotation clockwise.
pub fn single_motor_project(direction: &str) -> Value {
    project(blocks(vec![
        ("hat", hat(Some("run"))),
        (
            "run",
            block(
                "flippermotor_motorTurnForDirection",
                "hat",
                None,
                json!({"PORT": slot("port"), "VALUE": num("1")}),
                json!({"DIRECTION": field(direction), "UNIT": field("rotations")}),
            ),
        ),
        ("port", port_menu("A", "run")),
    ]))
}

fn zip_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(bytes).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

pub fn sb3_bytes(project: &Value) -> Vec<u8> {
    let json = serde_json::to_vec(project).expect("serialize project");
    zip_entries(&[("project.json", json.as_slice())])
}

pub fn lms_bytes(project: &Value) -> Vec<u8> {
    let sb3 = sb3_bytes(project);
    zip_entries(&[
        ("manifest.json", br#"{"type": "word-blocks"}"#.as_slice()),
        ("scratch.sb3", sb3.as_slice()),
    ])
}

pub fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
    zip_entries(entries)
}
