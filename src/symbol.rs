//! SymbolTable and the static module catalogs the parser consults to
//! resolve `pe.sections[0].name`-style accesses.
//!
//! Modules themselves (their concrete attribute sets) are treated as an
//! external collaborator; this crate only needs to present the
//! symbol-table *interface* the parser consults. [crate::modules]
//! supplies small, representative catalogs (`pe`, `elf`, `cuckoo`, …)
//! grounded in the scenarios from the upstream `yaramod` test suite
//! (`tests/python/test_visitor.py`).

use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Float,
    String,
    Bool,
    Regexp,
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub params: Vec<DataType>,
    pub return_type: DataType,
}

#[derive(Debug, Clone)]
pub enum SymbolKind {
    Scalar(DataType),
    Struct,
    Array(Box<SymbolKind>),
    Dictionary(Box<SymbolKind>),
    Function(Vec<FunctionSignature>),
}

/// A named entry in a module's (or the top-level) symbol tree. Structs,
/// arrays-of-struct and dictionaries-of-struct carry child `attributes`;
/// functions carry one `FunctionSignature` per overload.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub attributes: Vec<Rc<Symbol>>,
}

impl Symbol {
    pub fn scalar(name: impl Into<String>, ty: DataType) -> Rc<Symbol> {
        Rc::new(Symbol { name: name.into(), kind: SymbolKind::Scalar(ty), attributes: Vec::new() })
    }
    pub fn function(name: impl Into<String>, signatures: Vec<FunctionSignature>) -> Rc<Symbol> {
        Rc::new(Symbol { name: name.into(), kind: SymbolKind::Function(signatures), attributes: Vec::new() })
    }
    pub fn structure(name: impl Into<String>, attributes: Vec<Rc<Symbol>>) -> Rc<Symbol> {
        Rc::new(Symbol { name: name.into(), kind: SymbolKind::Struct, attributes })
    }
    pub fn array_of_struct(name: impl Into<String>, attributes: Vec<Rc<Symbol>>) -> Rc<Symbol> {
        Rc::new(Symbol {
            name: name.into(),
            kind: SymbolKind::Array(Box::new(SymbolKind::Struct)),
            attributes,
        })
    }
    pub fn array_of(name: impl Into<String>, ty: DataType) -> Rc<Symbol> {
        Rc::new(Symbol {
            name: name.into(),
            kind: SymbolKind::Array(Box::new(SymbolKind::Scalar(ty))),
            attributes: Vec::new(),
        })
    }
    pub fn dict_of_struct(name: impl Into<String>, attributes: Vec<Rc<Symbol>>) -> Rc<Symbol> {
        Rc::new(Symbol {
            name: name.into(),
            kind: SymbolKind::Dictionary(Box::new(SymbolKind::Struct)),
            attributes,
        })
    }

    pub fn get_attribute(&self, name: &str) -> Option<Rc<Symbol>> {
        self.attributes.iter().find(|a| a.name == name).cloned()
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function(_))
    }
    pub fn is_array(&self) -> bool {
        matches!(self.kind, SymbolKind::Array(_))
    }
    pub fn is_dict(&self) -> bool {
        matches!(self.kind, SymbolKind::Dictionary(_))
    }
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, SymbolKind::Struct)
    }
}

/// `VirusTotal` | `Avast` | `Everything` — selects which module catalog is
/// available to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFeatures {
    VirusTotal,
    Avast,
    Everything,
}

/// Top-level symbol namespace: imported modules plus rules declared so
/// far (a rule adds itself as a boolean-scalar symbol once parsed, so
/// later rules' conditions can reference it).
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<String, Rc<Symbol>>,
    order: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Rc<Symbol>) {
        if !self.entries.contains_key(&symbol.name) {
            self.order.push(symbol.name.clone());
        }
        self.entries.insert(symbol.name.clone(), symbol);
    }

    pub fn remove(&mut self, name: &str) {
        if self.entries.remove(name).is_some() {
            self.order.retain(|n| n != name);
        }
    }

    pub fn find(&self, name: &str) -> Option<Rc<Symbol>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_find() {
        let mut t = SymbolTable::new();
        t.insert(Symbol::scalar("foo", DataType::Bool));
        assert!(t.contains("foo"));
        assert_eq!(t.find("foo").unwrap().name, "foo");
        assert!(t.find("bar").is_none());
    }

    #[test]
    fn insert_overwrites_without_duplicating_order() {
        let mut t = SymbolTable::new();
        t.insert(Symbol::scalar("foo", DataType::Bool));
        t.insert(Symbol::scalar("foo", DataType::Integer));
        assert!(matches!(t.find("foo").unwrap().kind, SymbolKind::Scalar(DataType::Integer)));
    }

    #[test]
    fn remove_drops_entry() {
        let mut t = SymbolTable::new();
        t.insert(Symbol::scalar("foo", DataType::Bool));
        t.remove("foo");
        assert!(!t.contains("foo"));
    }

    #[test]
    fn struct_attribute_lookup() {
        let s = Symbol::structure("pe", vec![Symbol::scalar("entry_point", DataType::Integer)]);
        assert!(s.is_struct());
        assert_eq!(s.get_attribute("entry_point").unwrap().name, "entry_point");
        assert!(s.get_attribute("missing").is_none());
    }

    #[test]
    fn array_and_function_classification() {
        let arr = Symbol::array_of("sizes", DataType::Integer);
        assert!(arr.is_array());
        let func = Symbol::function("foo", vec![FunctionSignature { params: vec![DataType::String], return_type: DataType::Bool }]);
        assert!(func.is_function());
    }
}
