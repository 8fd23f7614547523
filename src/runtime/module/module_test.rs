use super::{Namespace, PrebuiltModule};
use crate::runtime::{module_id::ModuleId, value::Value};

fn id(path: &str) -> ModuleId {
    ModuleId::parse(path).unwrap()
}

#[test]
fn module_without_provides_exports_everything() {
    let mut ns = Namespace::new();
    ns.define("a", Value::Int(1));
    ns.define("b", Value::Int(2));
    let module = ns.into_instance(id("/m"), "test".into()).unwrap();

    assert_eq!(module.provided().len(), 2);
    assert_eq!(module.exports().len(), 2);
}

#[test]
fn provides_restrict_exports() {
    let mut ns = Namespace::new();
    ns.define("public", Value::Int(1));
    ns.define("private", Value::Int(2));
    ns.provide("public");
    ns.provide("public");
    let module = ns.into_instance(id("/m"), "test".into()).unwrap();

    assert_eq!(module.get("private"), Some(&Value::Int(2)));
    assert_eq!(module.exports().len(), 1);
    assert!(module.exports().contains_key("public"));
}

#[test]
fn providing_an_unbound_name_fails() {
    let mut ns = Namespace::new();
    ns.provide("ghost");
    let err = ns.into_instance(id("/m"), "test".into()).unwrap_err();
    assert!(err.contains("ghost"));
}

#[test]
fn import_brings_exports_and_records_dependency() {
    let lib = PrebuiltModule::new()
        .define("one", Value::Int(1))
        .docs("numbers")
        .instantiate(id("/lib"), "builtin".into());
    assert_eq!(lib.docs(), Some("numbers"));

    let mut ns = Namespace::new();
    ns.import(&lib);
    ns.import(&lib);
    assert_eq!(ns.lookup("one"), Some(&Value::Int(1)));

    let module = ns.into_instance(id("/user"), "test".into()).unwrap();
    assert_eq!(module.dependencies(), &[id("/lib")]);
}

#[test]
fn export_all_skips_imported_bindings() {
    let lib = PrebuiltModule::new()
        .define("one", Value::Int(1))
        .instantiate(id("/lib"), "builtin".into());

    let mut ns = Namespace::new();
    ns.import(&lib);
    ns.define("two", Value::Int(2));
    let module = ns.into_instance(id("/user"), "test".into()).unwrap();

    assert!(module.exports().contains_key("two"));
    assert!(!module.exports().contains_key("one"));
    assert_eq!(module.get("one"), Some(&Value::Int(1)));
}
