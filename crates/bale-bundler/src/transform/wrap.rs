//! Bundle framing.
//!
//! A linked bundle body has no module syntax left. Framing restores its
//! interface: ES module imports and exports for neutral bundles and
//! declaration documents, or an immediately-invoked function assigned to
//! one global for browser bundles.

use bale_graph::ImportedName;
use indexmap::IndexMap;

use super::Stage;
use crate::codegen::names::{is_identifier_name, property_key, string_literal};
use crate::codegen::{BundleInterface, ExportValue, GeneratedUnit};
use crate::diagnostics::BuildError;
use crate::target::Target;

/// Text placed around a bundle body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Frame {
    pub prologue: String,
    pub epilogue: String,
}

impl Frame {
    /// Surround the unit's code, shifting its mappings below the prologue.
    pub fn apply(self, mut unit: GeneratedUnit) -> GeneratedUnit {
        let lines = self.prologue.matches('\n').count() as u32;
        unit.map.shift_lines(lines);
        let mut code = self.prologue;
        code.push_str(&unit.code);
        if !code.is_empty() && !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&self.epilogue);
        unit.code = code;
        unit
    }
}

fn export_name(name: &str) -> String {
    if is_identifier_name(name) || name == "default" {
        name.to_string()
    } else {
        string_literal(name)
    }
}

/// Import and export statements for an ES module or declaration document.
pub(crate) fn esm_frame(interface: &BundleInterface, declarations: bool) -> Frame {
    let mut prologue = String::new();
    for external in &interface.externals {
        let source = string_literal(&external.specifier);
        let mut clauses = Vec::new();
        if let Some(default) = &external.default {
            clauses.push(default.clone());
        }
        if external.uses_namespace {
            clauses.push(format!("* as {}", external.local));
        }
        if clauses.is_empty() {
            prologue.push_str(&format!("import {source};\n"));
        } else {
            prologue.push_str(&format!("import {} from {source};\n", clauses.join(", ")));
        }
    }

    let mut epilogue = String::new();
    let mut locals = Vec::new();
    for export in &interface.exports {
        let exported = export_name(&export.name);
        match &export.value {
            ExportValue::Local(local) if *local == exported => locals.push(exported),
            ExportValue::Local(local) => locals.push(format!("{local} as {exported}")),
            ExportValue::External { module, name } => {
                let Some(external) = interface.externals.get(*module) else {
                    continue;
                };
                let source = string_literal(&external.specifier);
                let line = match name {
                    ImportedName::Namespace => format!("export * as {exported} from {source};\n"),
                    ImportedName::Default => {
                        format!("export {{ default as {exported} }} from {source};\n")
                    }
                    ImportedName::Named(imported) => {
                        let imported = export_name(imported);
                        if imported == exported {
                            format!("export {{ {exported} }} from {source};\n")
                        } else {
                            format!("export {{ {imported} as {exported} }} from {source};\n")
                        }
                    }
                };
                epilogue.push_str(&line);
            }
        }
    }
    for star in &interface.external_stars {
        if let Some(external) = interface.externals.get(*star) {
            epilogue.push_str(&format!(
                "export * from {};\n",
                string_literal(&external.specifier)
            ));
        }
    }
    if !locals.is_empty() {
        epilogue.push_str(&format!("export {{ {} }};\n", locals.join(", ")));
    }
    if declarations && epilogue.is_empty() {
        epilogue.push_str("export {};\n");
    }
    Frame { prologue, epilogue }
}

/// An immediately-invoked function assigned to `global_name`.
pub(crate) fn script_frame(
    interface: &BundleInterface,
    global_name: &str,
    globals: &IndexMap<String, String>,
) -> Frame {
    let mut params = Vec::new();
    let mut args = Vec::new();
    let mut interop = String::new();
    for external in &interface.externals {
        if external.is_bare() {
            tracing::warn!(
                package = %external.specifier,
                "Side-effect import of an external package has no effect in a browser bundle"
            );
            continue;
        }
        let global = match globals.get(&external.specifier) {
            Some(global) => global.clone(),
            None => {
                let guessed = bale_graph::ModuleId::package(external.specifier.as_str()).identifier_stem();
                tracing::warn!(
                    package = %external.specifier,
                    global = %guessed,
                    "No global configured for external package; guessing"
                );
                guessed
            }
        };
        params.push(external.local.clone());
        args.push(global);
        if let Some(default) = &external.default {
            let local = &external.local;
            interop.push_str(&format!(
                "var {default} = {local} && {local}.__esModule ? {local}[\"default\"] : {local};\n"
            ));
        }
    }
    for star in &interface.external_stars {
        if let Some(external) = interface.externals.get(*star) {
            tracing::warn!(
                package = %external.specifier,
                "`export *` from an external package cannot be exposed on a browser global"
            );
        }
    }

    let prologue = format!(
        "var {global_name} = (function ({}) {{\n\"use strict\";\n{interop}",
        params.join(", ")
    );

    let mut epilogue = String::from("return Object.freeze({\n  __proto__: null,\n");
    for export in &interface.exports {
        let value = match &export.value {
            ExportValue::Local(local) => local.clone(),
            ExportValue::External { module, name } => match interface.externals.get(*module) {
                Some(external) => external.access(name),
                None => continue,
            },
        };
        epilogue.push_str(&format!(
            "  get {}() {{ return {value}; }},\n",
            property_key(&export.name)
        ));
    }
    epilogue.push_str(&format!("}});\n}})({});\n", args.join(", ")));
    Frame { prologue, epilogue }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Wrap {
    Module,
    Script {
        global_name: String,
        globals: IndexMap<String, String>,
    },
}

/// Frames a bundle according to its platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapStage {
    wrap: Wrap,
}

impl WrapStage {
    /// Neutral bundles: an ES module.
    pub fn module() -> Self {
        Self { wrap: Wrap::Module }
    }

    /// Browser bundles: a script exposing one global.
    pub fn script(global_name: impl Into<String>, globals: IndexMap<String, String>) -> Self {
        Self {
            wrap: Wrap::Script {
                global_name: global_name.into(),
                globals,
            },
        }
    }

    pub fn for_target(target: &Target) -> Self {
        if !target.is_script() {
            return Self::module();
        }
        let global_name = target
            .global_name
            .clone()
            .unwrap_or_else(|| bale_graph::module_id::sanitize_identifier(&target.name));
        Self::script(global_name, target.globals.clone())
    }
}

impl Stage for WrapStage {
    fn name(&self) -> &'static str {
        "wrap"
    }

    fn apply(&self, unit: GeneratedUnit) -> Result<GeneratedUnit, BuildError> {
        let Some(interface) = &unit.interface else {
            return Err(BuildError::generation(
                unit.path.display().to_string(),
                "bundle has no export interface to wrap",
            ));
        };
        let frame = match &self.wrap {
            Wrap::Module => esm_frame(interface, false),
            Wrap::Script {
                global_name,
                globals,
            } => script_frame(interface, global_name, globals),
        };
        Ok(frame.apply(unit))
    }
}
