//! Object library listing command.

use clap::Args;

use parche_model::{AttributeVariant, ObjectDefinition, ObjectLibrary, ParamKind};

#[derive(Args)]
pub struct ObjectsArgs {
    /// Show details for a specific object type
    #[arg(value_name = "TYPE")]
    type_name: Option<String>,
}

pub fn run(args: ObjectsArgs) -> anyhow::Result<()> {
    let library = ObjectLibrary::with_builtins();

    if let Some(type_name) = &args.type_name {
        let def = library
            .get(type_name)
            .ok_or_else(|| anyhow::anyhow!("Unknown object type: {}", type_name))?;
        print_definition(def);
    } else {
        println!("Available Objects");
        println!("=================");
        println!();
        for def in library.all_objects() {
            println!(
                "  {:12}  {} in / {} out, {} attribute(s), {} parameter(s)",
                def.type_name,
                def.inlets.len(),
                def.outlets.len(),
                def.attributes.len(),
                def.parameters.len()
            );
        }
        println!();
        println!("Use 'parche objects <type>' for details.");
    }

    Ok(())
}

fn print_definition(def: &ObjectDefinition) {
    println!("{}", def.type_name);
    println!("{}", "=".repeat(def.type_name.len()));

    if !def.inlets.is_empty() {
        println!();
        println!("Inlets:");
        for inlet in &def.inlets {
            let required = if inlet.required { "required" } else { "optional" };
            println!("  {:12}  {:12}  {}", inlet.name, inlet.signal.name(), required);
        }
    }
    if !def.outlets.is_empty() {
        println!();
        println!("Outlets:");
        for outlet in &def.outlets {
            println!("  {:12}  {}", outlet.name, outlet.signal.name());
        }
    }
    if !def.attributes.is_empty() {
        println!();
        println!("Attributes:");
        for attr in &def.attributes {
            println!("  {:14}  {}", attr.name, describe_variant(&attr.variant));
        }
    }
    if !def.parameters.is_empty() {
        println!();
        println!("Parameters:");
        for param in &def.parameters {
            println!("  {:14}  {}", param.name, describe_kind(&param.kind));
        }
    }
}

fn describe_variant(variant: &AttributeVariant) -> String {
    match variant {
        AttributeVariant::Spinner { min, max, default } => {
            format!("spinner [{min}..{max}], default {default}")
        }
        AttributeVariant::Combo { entries, .. } => {
            let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
            format!("combo {{{}}}", labels.join(", "))
        }
        AttributeVariant::ObjectRef { expected_type } => match expected_type {
            Some(ty) => format!("reference to a {ty} instance"),
            None => "reference to an instance".to_string(),
        },
        AttributeVariant::Filename => "filename".to_string(),
        AttributeVariant::TableName => "table name".to_string(),
        AttributeVariant::Text => "free text".to_string(),
    }
}

fn describe_kind(kind: &ParamKind) -> String {
    match kind {
        ParamKind::Frac { min, max } => format!("frac [{min}..{max}]"),
        ParamKind::Int { min, max } => format!("int [{min}..{max}]"),
        ParamKind::Bool => "bool".to_string(),
    }
}
