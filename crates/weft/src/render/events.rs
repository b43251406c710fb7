//! Event hooks.
//!
//! Handlers registered on the [Engine](crate::Engine) can observe and change what a render does
//!     at a few well-defined points.
//! When several handlers are registered they run in registration order, and each sees the
//!     result of the previous one.

use crate::error::InvocationError;
use crate::value::Value;

pub trait EventHandler: Send + Sync {
    /// Called when a getter or method fails.
    ///
    /// Returning `Ok` replaces the failure with a value, and `Ok(None)` makes the
    ///     access evaluate to nothing.
    fn method_exception(&self, err: InvocationError) -> Result<Option<Value>, InvocationError> {
        Err(err)
    }

    /// Called before the value of a reference is written to the output.
    fn reference_insert(&self, reference: &str, value: Value) -> Value {
        let _ = reference;
        value
    }

    /// Called when a reference has no value.
    ///
    /// Returning a value renders it in place of the reference.
    fn invalid_reference(&self, reference: &str) -> Option<Value> {
        let _ = reference;
        None
    }

    /// Called before `#include` or `#parse` loads a resource.
    ///
    /// Returns the name of the resource to load instead, or `None` to skip loading.
    fn include(&self, resource: &str, current_template: &str) -> Option<String> {
        let _ = current_template;
        Some(resource.to_string())
    }
}

/// The handlers registered on an engine.
#[derive(Default)]
pub struct EventCartridge {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl EventCartridge {
    pub fn push(&mut self, handler: Box<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn method_exception(&self, err: InvocationError) -> Result<Option<Value>, InvocationError> {
        let mut err = err;
        for handler in &self.handlers {
            match handler.method_exception(err) {
                Ok(value) => return Ok(value),
                Err(next) => err = next,
            }
        }
        Err(err)
    }

    pub fn reference_insert(&self, reference: &str, value: Value) -> Value {
        self.handlers
            .iter()
            .fold(value, |value, handler| handler.reference_insert(reference, value))
    }

    pub fn invalid_reference(&self, reference: &str) -> Option<Value> {
        self.handlers
            .iter()
            .find_map(|handler| handler.invalid_reference(reference))
    }

    pub fn include(&self, resource: &str, current_template: &str) -> Option<String> {
        let mut resource = resource.to_string();
        for handler in &self.handlers {
            resource = handler.include(&resource, current_template)?;
        }
        Some(resource)
    }
}

/// Escapes HTML special characters in the text of every inserted string value.
#[derive(Debug, Default)]
pub struct EscapeHtml;

impl EventHandler for EscapeHtml {
    fn reference_insert(&self, _: &str, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(escape_html(&s)),
            other => other,
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prefix(&'static str);

    impl EventHandler for Prefix {
        fn reference_insert(&self, _: &str, value: Value) -> Value {
            Value::String(format!("{}{}", self.0, value))
        }

        fn include(&self, resource: &str, _: &str) -> Option<String> {
            if resource.starts_with("secret") {
                None
            } else {
                Some(format!("{}{resource}", self.0))
            }
        }
    }

    struct Recover;

    impl EventHandler for Recover {
        fn method_exception(&self, _: InvocationError) -> Result<Option<Value>, InvocationError> {
            Ok(Some(Value::from("recovered")))
        }
    }

    #[test]
    fn handlers_chain_in_order() {
        let mut cartridge = EventCartridge::default();
        cartridge.push(Box::new(Prefix("a/")));
        cartridge.push(Box::new(Prefix("b/")));
        assert_eq!(
            cartridge.reference_insert("$x", Value::from("v")).to_text(),
            "b/a/v"
        );
        assert_eq!(cartridge.include("page", "main").as_deref(), Some("b/a/page"));
        assert_eq!(cartridge.include("secret", "main"), None);
    }

    #[test]
    fn method_exception_can_recover() {
        let err = InvocationError::new("get", "Thing", "boom".into());
        let mut cartridge = EventCartridge::default();
        assert!(cartridge.method_exception(err.clone()).is_err());
        cartridge.push(Box::new(Recover));
        assert_eq!(
            cartridge.method_exception(err).unwrap(),
            Some(Value::from("recovered"))
        );
    }

    #[test]
    fn escape_html_only_touches_strings() {
        assert_eq!(
            EscapeHtml
                .reference_insert("$x", Value::from("<a href='x'>&</a>"))
                .to_text(),
            "&lt;a href=&#39;x&#39;&gt;&amp;&lt;/a&gt;"
        );
        assert_eq!(EscapeHtml.reference_insert("$x", Value::Int(1)), Value::Int(1));
    }
}
