use colored::*;
use pinza_core::{
    error::CallError,
    registry::Descriptor,
    schema::{Cardinality, FieldKind, MessageType, MethodDescriptor, ServiceDescriptor},
};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct ServiceList(pub Vec<String>);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<CallError> for FormattedString {
    fn from(err: CallError) -> Self {
        let title = match &err {
            CallError::NameNotFound(_) => "Symbol Lookup Failed:",
            CallError::InvalidRequest(_) => "Invalid Request:",
            CallError::UnsupportedFormat(_) => "Unsupported Format:",
            CallError::Transport(_) => "Call Failed:",
            CallError::Decode(_) => "Unexpected Response:",
            CallError::Cancelled => "Cancelled:",
        };

        FormattedString(format!("{}\n\n'{}'", title.red().bold(), err))
    }
}

impl From<anyhow::Error> for FormattedString {
    fn from(err: anyhow::Error) -> Self {
        FormattedString(format!("{}\n\n'{:#}'", "Error:".red().bold(), err))
    }
}

impl From<ServiceList> for FormattedString {
    fn from(ServiceList(services): ServiceList) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Available Services:\n");
        for svc in services {
            out.push_str(&format!("  - {}\n", svc.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<Descriptor> for FormattedString {
    fn from(descriptor: Descriptor) -> Self {
        match descriptor {
            Descriptor::Message(message) => FormattedString::from(message.as_ref()),
            Descriptor::Service(service) => FormattedString::from(service.as_ref()),
        }
    }
}

impl From<&ServiceDescriptor> for FormattedString {
    fn from(service: &ServiceDescriptor) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "service".cyan(),
            service.name().green()
        ));

        for method in service.methods() {
            out.push_str("  ");
            let method_fmt = FormattedString::from((service, method));
            out.push_str(&method_fmt.0);
            out.push_str("\n\n");
        }
        out.push('}');
        FormattedString(out)
    }
}

impl From<(&ServiceDescriptor, &MethodDescriptor)> for FormattedString {
    fn from((service, method): (&ServiceDescriptor, &MethodDescriptor)) -> Self {
        let binding = method.binding_for(service.name());

        FormattedString(format!(
            "{} {}({}) {} ({}); {}",
            "rpc".cyan(),
            method.name().green(),
            method.request_type().yellow(),
            "returns".cyan(),
            method.response_type().yellow(),
            format!("// {} {}", binding.verb.as_method(), binding.path).dimmed()
        ))
    }
}

impl From<&MessageType> for FormattedString {
    fn from(message: &MessageType) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "message".cyan(),
            message.name().green()
        ));

        for field in message.fields() {
            let label = match field.cardinality() {
                Cardinality::Optional => "".to_string(),
                Cardinality::Required => format!("{} ", "required".cyan()),
                Cardinality::Repeated => format!("{} ", "repeated".cyan()),
            };

            let type_name = match field.kind() {
                FieldKind::Bool => "bool".yellow(),
                FieldKind::Int32 => "int32".yellow(),
                FieldKind::Int64 => "int64".yellow(),
                FieldKind::Uint32 => "uint32".yellow(),
                FieldKind::Uint64 => "uint64".yellow(),
                FieldKind::Float => "float".yellow(),
                FieldKind::Double => "double".yellow(),
                FieldKind::String => "string".yellow(),
                FieldKind::Bytes => "bytes".yellow(),
                FieldKind::Enum => "enum".yellow(),
                FieldKind::Message(name) => name.as_str().yellow(),
            };

            out.push_str(&format!(
                "  {}{}{} {} = {};\n",
                label,
                type_name,
                " ".normal(), // Reset color
                field.name(),
                field.number
            ));
        }
        out.push('}');
        FormattedString(out)
    }
}
