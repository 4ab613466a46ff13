#![allow(dead_code)]

use proofedit::{parse, Expression, SymbolTables};

pub const DEFINITIONS: &str = r#"{
	"expressions": [
		{ "symbol": "and", "arity": 2, "attributes": ["conjunction"], "format": "{0} ∧ {1}", "requires_brackets": true },
		{ "symbol": "implies", "arity": 2, "attributes": ["deduction"], "format": "{0} → {1}", "requires_brackets": true },
		{ "symbol": "not", "arity": 1, "format": "¬{0}" },
		{ "symbol": "forall", "arity": 1, "bound_variables": 1, "attributes": ["generalization"], "format": "∀{v0}. {0}" },
		{ "symbol": "exists", "arity": 1, "bound_variables": 1, "format": "∃{v0}. {0}" },
		{ "symbol": "eq", "arity": 2, "format": "{0} = {1}" },
		{ "symbol": "f", "arity": 2 },
		{ "symbol": "zero" }
	],
	"types": [
		{
			"symbol": "Group",
			"properties": [
				{ "symbol": "is-abelian", "format": "{term} is abelian" },
				{ "symbol": "is-finite" }
			],
			"related_objects": [
				{ "symbol": "identity", "format": "{term} is the identity of {parent}" }
			]
		},
		{
			"symbol": "VectorSpace",
			"default_qualifier": { "variables": ["F"], "format": "over {0}" },
			"properties": [
				{ "symbol": "finite-dimensional" },
				{ "symbol": "normed" }
			],
			"related_objects": [
				{ "symbol": "zero-vector" }
			]
		},
		{
			"symbol": "Set",
			"qualifiers": [
				{ "symbol": "subset-of", "variables": ["U"], "format": "{term} ⊆ {0}" }
			],
			"properties": [
				{ "symbol": "is-countable", "required_qualifier": "subset-of" },
				{ "symbol": "is-empty" }
			]
		}
	],
	"relations": [
		{ "symbol": "is-subgroup-of", "format": "{first} ≤ {second}" }
	],
	"standalone_properties": [
		{ "symbol": "is-prime" }
	]
}"#;

pub fn tables() -> SymbolTables {
	SymbolTables::from_json(DEFINITIONS).unwrap()
}

pub fn expr(tables: &SymbolTables, input: &str) -> Expression {
	parse(tables, input).unwrap()
}
