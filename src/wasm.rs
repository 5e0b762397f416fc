use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn compile_project_json_to_python(source: &str) -> Result<String, JsValue> {
    compile_project_json_to_python_with_options(source, false)
}

#[wasm_bindgen]
pub fn compile_project_json_to_python_with_options(
    source: &str,
    best_effort: bool,
) -> Result<String, JsValue> {
    let options = crate::CompileOptions {
        parse: crate::parser::ParseOptions { best_effort },
    };
    crate::compile_project_json(source, options)
        .map(|compiled| compiled.python)
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}

#[wasm_bindgen]
pub fn render_project_json_graph(source: &str) -> Result<String, JsValue> {
    crate::compile_project_json(source, crate::CompileOptions::default())
        .map(|compiled| compiled.graph)
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
