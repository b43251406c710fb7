use std::any::Any;
use std::sync::{Arc, OnceLock};

use weft::error::InvocationError;
use weft::introspect::{Class, Object};
use weft::render::events::{EscapeHtml, EventHandler};
use weft::{Config, Engine, EngineBuilder, MapContext, Value};
use weft_testing::*;

struct Person {
    name: String,
    admin: bool,
}

impl Object for Person {
    fn class(&self) -> Arc<Class> {
        static CLASS: OnceLock<Arc<Class>> = OnceLock::new();
        CLASS
            .get_or_init(|| {
                Class::builder::<Person>("Person")
                    .getter("getName", |p| Some(Value::from(p.name.as_str())))
                    .getter("getLabel", |p| Some(Value::from(format!("person {}", p.name))))
                    .getter("isAdmin", |p| Some(Value::Bool(p.admin)))
                    .method("greet", Some(1), |p, args| {
                        Some(Value::from(format!("{}, {}", args[0], p.name)))
                    })
                    .fallible_method("fail", Some(0), |p, _| {
                        Err(format!("{} refuses", p.name).into())
                    })
                    .build()
            })
            .clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_text(&self) -> String {
        format!("Person({})", self.name)
    }
}

struct Pet {
    species: &'static str,
}

impl Object for Pet {
    fn class(&self) -> Arc<Class> {
        static CLASS: OnceLock<Arc<Class>> = OnceLock::new();
        CLASS
            .get_or_init(|| {
                Class::builder::<Pet>("Pet")
                    .getter("getLabel", |p| Some(Value::from(format!("pet {}", p.species))))
                    .build()
            })
            .clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A record whose fields are only known at runtime.
struct Record {
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    fn field(&self, name: &str) -> Option<Value> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value.clone())
    }
}

impl Object for Record {
    fn class(&self) -> Arc<Class> {
        let mut builder = Class::builder::<Record>("Record").per_instance();
        for (field, _) in &self.fields {
            let field: &'static str = *field;
            let mut getter = String::from("get");
            getter.extend(field.chars().take(1).flat_map(char::to_uppercase));
            getter.push_str(&field[1..]);
            builder = builder.getter(&getter, move |r| r.field(field));
        }
        builder.build()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Settings looked up by key, with `.key` falling back to `get("key")`.
struct Settings;

impl Object for Settings {
    fn class(&self) -> Arc<Class> {
        static CLASS: OnceLock<Arc<Class>> = OnceLock::new();
        CLASS
            .get_or_init(|| {
                Class::builder::<Settings>("Settings")
                    .method("get", Some(1), |_, args| match args[0].as_str()? {
                        "theme" => Some(Value::from("dark")),
                        _ => None,
                    })
                    .map_like()
                    .build()
            })
            .clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Counts down from a number when iterated.
struct Countdown(i64);

impl Object for Countdown {
    fn class(&self) -> Arc<Class> {
        Class::builder::<Countdown>("Countdown").build()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn iter(&self) -> Option<Vec<Value>> {
        Some((1..=self.0).rev().map(Value::Int).collect())
    }
}

fn ada() -> Value {
    Value::object(Person {
        name: "Ada".into(),
        admin: true,
    })
}

fn context() -> MapContext {
    MapContext::new()
        .with("ada", ada())
        .with("rex", Value::object(Pet { species: "dog" }))
        .with(
            "mixed",
            vec![
                ada(),
                Value::object(Pet { species: "cat" }),
                Value::object(Person {
                    name: "Bob".into(),
                    admin: false,
                }),
            ],
        )
        .with(
            "records",
            vec![
                Value::object(Record {
                    fields: vec![("title", Value::from("first"))],
                }),
                Value::object(Record {
                    fields: vec![("size", Value::Int(2)), ("title", Value::from("second"))],
                }),
            ],
        )
        .with("settings", Value::object(Settings))
        .with("countdown", Value::object(Countdown(3)))
        .with("markup", "<b>&</b>")
}

test_suite![
    options(TestOption::Context(context)),
    render_tests(
        (getter_as_property, "$ada.name", "Ada"),
        (getter_called_directly, "$ada.getName()", "Ada"),
        (property_is_case_folded, "$ada.Name", "Ada"),
        (boolean_getter, "#if($ada.admin)admin#end", "admin"),
        (method_with_argument, "$ada.greet('Hello')", "Hello, Ada"),
        (method_name_ignores_case, "$ada.GREET('Hi')", "Hi, Ada"),
        (object_text, "$ada", "Person(Ada)"),
        (object_in_string_literal, "#set($s = \"<$rex.label>\")$s", "<pet dog>"),
        (same_node_different_types, "#foreach($x in $mixed)$x.label;#end", "person Ada;pet cat;person Bob;"),
        (same_node_same_type_different_instances, "#foreach($x in $mixed)#if($x.admin)A#else-#end#end", "A-"),
        (per_instance_classes, "#foreach($r in $records)$r.title#end", "firstsecond"),
        (map_like_object, "$settings.theme", "dark"),
        (iterable_object, "#foreach($i in $countdown)$i#end", "321"),
        (object_in_map, "#set($m = {'who': $ada})$m.who.name", "Ada"),
        (reference_insert_untouched_without_handlers, "$markup", "<b>&</b>"),
    ),
    diagnostic_tests(
        (missing_member, "$rex.name", "$rex.name"),
        (per_instance_missing_member, "#foreach($r in $records)[$r.size]#end", "[$r.size][2]"),
        (map_like_missing_key, "$settings.font", "$settings.font"),
        (non_iterable_object, "#foreach($i in $ada)x#else none#end", " none"),
    ),
    failure_tests(
        (failing_method, "$ada.fail()"),
    ),
    concurrency_tests(
        (objects_across_threads, "#foreach($x in $mixed)$x.label#end$x", 8),
    ),
];

mod shared_cache {
    use super::*;

    fn shared() -> Config {
        Config::default().with_shared_accessor_cache(true)
    }

    test_suite![
        options(TestOption::Context(context), TestOption::Config(shared)),
        render_tests(
            (same_node_different_types, "#foreach($x in $mixed)$x.label;#end", "person Ada;pet cat;person Bob;"),
            (per_instance_classes, "#foreach($r in $records)$r.title#end", "firstsecond"),
        ),
        concurrency_tests(
            (shared_accessors_across_threads, "#foreach($x in $mixed)$foreach.count$x.label#end$x", 16),
        ),
    ];
}

mod escaping {
    use super::*;

    fn escape(builder: EngineBuilder) -> EngineBuilder {
        builder.event_handler(EscapeHtml)
    }

    test_suite![
        options(TestOption::Context(context), TestOption::CustomEngine(escape)),
        render_tests(
            (references_are_escaped, "$markup", "&lt;b&gt;&amp;&lt;/b&gt;"),
            (text_is_not_escaped, "<i>$ada.name</i>", "<i>Ada</i>"),
            (numbers_are_untouched, "#set($n = 1 < 2)$n", "true"),
        ),
    ];
}

struct Recover;

impl EventHandler for Recover {
    fn method_exception(&self, err: InvocationError) -> Result<Option<Value>, InvocationError> {
        if err.accessor == "fail" {
            Ok(Some(Value::from(format!("[{} failed]", err.target_type))))
        } else {
            Err(err)
        }
    }

    fn invalid_reference(&self, reference: &str) -> Option<Value> {
        reference
            .starts_with("$default")
            .then(|| Value::from("fallback"))
    }

    fn include(&self, resource: &str, _: &str) -> Option<String> {
        match resource {
            "hidden.wft" => None,
            "old.wft" => Some("new.wft".into()),
            other => Some(other.into()),
        }
    }
}

mod recovery {
    use super::*;

    fn recover(builder: EngineBuilder) -> EngineBuilder {
        builder.event_handler(Recover)
    }

    static RESOURCES: &[(&str, &str)] = &[("new.wft", "new"), ("hidden.wft", "hidden")];

    test_suite![
        options(
            TestOption::Context(context),
            TestOption::CustomEngine(recover),
            TestOption::Resources(RESOURCES),
        ),
        render_tests(
            (method_exception_is_recovered, "$ada.fail()", "[Person failed]"),
            (include_is_redirected, "#include('old.wft')#parse('old.wft')", "newnew"),
        ),
        diagnostic_tests(
            (include_is_skipped, "[#include('hidden.wft')]", "[]"),
            (invalid_reference_is_replaced, "$defaultName", "fallback"),
        ),
        failure_tests(
            (other_failures_propagate, "$markup.charAt(100)"),
        ),
    ];
}

#[test]
fn template_rerendered_with_changed_type() {
    let engine = Engine::new();
    let template = engine.compile("label", "$x.label").unwrap();
    let mut person = MapContext::new().with("x", ada());
    let mut pet = MapContext::new().with("x", Value::object(Pet { species: "owl" }));
    assert_eq!(engine.render_to_string(&template, &mut person).unwrap(), "person Ada");
    assert_eq!(engine.render_to_string(&template, &mut pet).unwrap(), "pet owl");
    assert_eq!(engine.render_to_string(&template, &mut person).unwrap(), "person Ada");
}

#[test]
fn downcast_from_value() {
    let value = ada();
    assert_eq!(value.downcast_ref::<Person>().map(|p| p.admin), Some(true));
    assert!(value.downcast_ref::<Pet>().is_none());
    assert_eq!(value.type_name(), "Person");
}
