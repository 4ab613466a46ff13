use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// Атрибут определения, по которому парсер сливает свойства в предшествующее выражение типа.
pub const CONJUNCTION: &str = "conjunction";
/// Атрибут определения, которым записывается вывод шага-дедукции.
pub const DEDUCTION: &str = "deduction";
/// Атрибут определения, которым записывается вывод шага-обобщения.
pub const GENERALIZATION: &str = "generalization";

/// Символ, для которого есть собственная синтаксическая конструкция.
pub const WITH: &str = "with";

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct ExpressionDefinition {
	pub symbol: String,
	/// Число компонент.
	#[serde(default)]
	pub arity: usize,
	/// Число связанных переменных.
	#[serde(default)]
	pub bound_variables: usize,
	#[serde(default)]
	pub attributes: BTreeSet<String>,
	#[serde(default)]
	pub format: Option<String>,
	/// Нужно ли брать выражение в скобки, когда оно стоит внутри другого.
	#[serde(default)]
	pub requires_brackets: bool,
}

impl ExpressionDefinition {
	pub fn has_attribute(&self, attribute: &str) -> bool {
		self.attributes.contains(attribute)
	}
}

/// Квалификатор по умолчанию: набор типизированных слотов. Безымянный, поэтому в выражении его компоненты идут сразу за термом.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct DefaultQualifier {
	pub variables: Vec<String>,
	#[serde(default)]
	pub format: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct TypeQualifierDefinition {
	pub symbol: String,
	#[serde(default)]
	pub variables: Vec<String>,
	#[serde(default)]
	pub format: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct PropertyDefinition {
	pub symbol: String,
	/// Символ квалификатора родительского типа, без которого свойство не имеет смысла.
	#[serde(default)]
	pub required_qualifier: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct RelatedObjectDefinition {
	pub symbol: String,
	#[serde(default)]
	pub required_qualifier: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct TypeDefinition {
	pub symbol: String,
	#[serde(default)]
	pub default_qualifier: Option<DefaultQualifier>,
	#[serde(default)]
	pub qualifiers: Vec<Arc<TypeQualifierDefinition>>,
	#[serde(default)]
	pub properties: Vec<Arc<PropertyDefinition>>,
	#[serde(default)]
	pub related_objects: Vec<Arc<RelatedObjectDefinition>>,
	#[serde(default)]
	pub format: Option<String>,
}

impl TypeDefinition {
	pub fn qualifier(&self, symbol: &str) -> Option<&Arc<TypeQualifierDefinition>> {
		self.qualifiers.iter().find(|qualifier| qualifier.symbol == symbol)
	}

	/// Число компонент квалификатора, которое использует свойство или связанный объект этого типа.
	pub fn qualifier_arity(&self, required_qualifier: Option<&str>) -> usize {
		match required_qualifier {
			Some(symbol) => self.qualifier(symbol).map(|qualifier| qualifier.variables.len()).unwrap_or(0),
			None => self.default_qualifier.as_ref().map(|qualifier| qualifier.variables.len()).unwrap_or(0),
		}
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct TypeRelationDefinition {
	pub symbol: String,
	#[serde(default)]
	pub format: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct StandalonePropertyDefinition {
	pub symbol: String,
	#[serde(default)]
	pub format: Option<String>,
}

/// Определения в том виде, в котором их присылает сервер.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Definitions {
	#[serde(default)]
	pub expressions: Vec<ExpressionDefinition>,
	#[serde(default)]
	pub types: Vec<TypeDefinition>,
	#[serde(default)]
	pub relations: Vec<TypeRelationDefinition>,
	#[serde(default)]
	pub standalone_properties: Vec<StandalonePropertyDefinition>,
}

#[derive(Debug, Error)]
pub enum TableError {
	#[error("symbol `{symbol}` can't be used as a definition symbol")]
	InvalidSymbol {
		symbol: String,
	},
	#[error("symbol `{symbol}` is defined twice among {table}")]
	DuplicateSymbol {
		symbol: String,
		table: &'static str,
	},
	#[error("`{symbol}` requires qualifier `{qualifier}`, which is not defined for type `{parent}`")]
	UnresolvedSymbol {
		symbol: String,
		qualifier: String,
		parent: String,
	},
	#[error("can't read definitions: {0}")]
	Json(#[from] serde_json::Error),
}

/// Таблицы символов, по которым работает парсер. Строятся один раз за сессию редактирования и дальше не меняются.
#[derive(Clone, Debug, Default)]
pub struct SymbolTables {
	expressions: BTreeMap<String, Arc<ExpressionDefinition>>,
	types: BTreeMap<String, Arc<TypeDefinition>>,
	relations: BTreeMap<String, Arc<TypeRelationDefinition>>,
	standalone_properties: BTreeMap<String, Arc<StandalonePropertyDefinition>>,

	qualifiers: BTreeMap<String, (Arc<TypeQualifierDefinition>, Arc<TypeDefinition>)>,
	properties: BTreeMap<String, (Arc<PropertyDefinition>, Arc<TypeDefinition>)>,
	related_objects: BTreeMap<String, (Arc<RelatedObjectDefinition>, Arc<TypeDefinition>)>,
}

fn check_symbol(symbol: &str) -> Result<(), TableError> {
	let is_invalid = symbol.is_empty()
		|| symbol == WITH
		|| symbol.starts_with('$')
		|| symbol.chars().any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '{' | '}'));
	if is_invalid {
		Err(TableError::InvalidSymbol { symbol: symbol.to_string() })
	} else {
		Ok(())
	}
}

fn insert_unique<T>(map: &mut BTreeMap<String, T>, symbol: &str, value: T, table: &'static str) -> Result<(), TableError> {
	use std::collections::btree_map::Entry::*;

	check_symbol(symbol)?;
	match map.entry(symbol.to_string()) {
		Vacant(vacant) => {
			vacant.insert(value);
			Ok(())
		},
		Occupied(_) => Err(TableError::DuplicateSymbol { symbol: symbol.to_string(), table }),
	}
}

fn check_required_qualifier(symbol: &str, required: Option<&str>, parent: &TypeDefinition) -> Result<(), TableError> {
	match required {
		Some(qualifier) if parent.qualifier(qualifier).is_none() => Err(TableError::UnresolvedSymbol {
			symbol: symbol.to_string(),
			qualifier: qualifier.to_string(),
			parent: parent.symbol.clone(),
		}),
		_ => Ok(()),
	}
}

impl SymbolTables {
	/// Проверяет определения и строит по ним таблицы, включая три производные таблицы «символ → родительский тип».
	pub fn build(definitions: Definitions) -> Result<Self, TableError> {
		let mut tables = SymbolTables::default();

		for definition in definitions.expressions {
			let symbol = definition.symbol.clone();
			insert_unique(&mut tables.expressions, &symbol, Arc::new(definition), "expressions")?;
		}

		for definition in definitions.types {
			let parent = Arc::new(definition);
			insert_unique(&mut tables.types, &parent.symbol, parent.clone(), "types")?;

			for qualifier in &parent.qualifiers {
				insert_unique(&mut tables.qualifiers, &qualifier.symbol, (qualifier.clone(), parent.clone()), "qualifiers")?;
			}
			for property in &parent.properties {
				check_required_qualifier(&property.symbol, property.required_qualifier.as_deref(), &parent)?;
				insert_unique(&mut tables.properties, &property.symbol, (property.clone(), parent.clone()), "properties")?;
			}
			for object in &parent.related_objects {
				check_required_qualifier(&object.symbol, object.required_qualifier.as_deref(), &parent)?;
				insert_unique(&mut tables.related_objects, &object.symbol, (object.clone(), parent.clone()), "related objects")?;
			}
		}

		for definition in definitions.relations {
			let symbol = definition.symbol.clone();
			insert_unique(&mut tables.relations, &symbol, Arc::new(definition), "relations")?;
		}

		for definition in definitions.standalone_properties {
			let symbol = definition.symbol.clone();
			insert_unique(&mut tables.standalone_properties, &symbol, Arc::new(definition), "standalone properties")?;
		}

		tables.warn_about_shadowing();
		tracing::info!(
			expressions = tables.expressions.len(),
			types = tables.types.len(),
			qualifiers = tables.qualifiers.len(),
			properties = tables.properties.len(),
			related_objects = tables.related_objects.len(),
			relations = tables.relations.len(),
			standalone_properties = tables.standalone_properties.len(),
			"symbol tables are built"
		);

		Ok(tables)
	}

	/// Прочитать определения из JSON и построить таблицы.
	pub fn from_json(json: &str) -> Result<Self, TableError> {
		Self::build(serde_json::from_str(json)?)
	}

	fn warn_about_shadowing(&self) {
		let tables: [(&str, Vec<&String>); 7] = [
			("expressions", self.expressions.keys().collect()),
			("types", self.types.keys().collect()),
			("qualifiers", self.qualifiers.keys().collect()),
			("properties", self.properties.keys().collect()),
			("related objects", self.related_objects.keys().collect()),
			("relations", self.relations.keys().collect()),
			("standalone properties", self.standalone_properties.keys().collect()),
		];

		let mut seen: BTreeMap<&String, &str> = BTreeMap::new();
		for (table, symbols) in tables.iter() {
			for &symbol in symbols {
				match seen.get(symbol) {
					Some(earlier) => tracing::warn!(%symbol, shadowed_in = %table, wins = %earlier, "symbol is defined in several tables"),
					None => {
						seen.insert(symbol, *table);
					},
				}
			}
		}
	}

	pub fn expression(&self, symbol: &str) -> Option<&Arc<ExpressionDefinition>> {
		self.expressions.get(symbol)
	}

	pub fn type_definition(&self, symbol: &str) -> Option<&Arc<TypeDefinition>> {
		self.types.get(symbol)
	}

	pub fn qualifier(&self, symbol: &str) -> Option<&(Arc<TypeQualifierDefinition>, Arc<TypeDefinition>)> {
		self.qualifiers.get(symbol)
	}

	pub fn property(&self, symbol: &str) -> Option<&(Arc<PropertyDefinition>, Arc<TypeDefinition>)> {
		self.properties.get(symbol)
	}

	pub fn related_object(&self, symbol: &str) -> Option<&(Arc<RelatedObjectDefinition>, Arc<TypeDefinition>)> {
		self.related_objects.get(symbol)
	}

	pub fn relation(&self, symbol: &str) -> Option<&Arc<TypeRelationDefinition>> {
		self.relations.get(symbol)
	}

	pub fn standalone_property(&self, symbol: &str) -> Option<&Arc<StandalonePropertyDefinition>> {
		self.standalone_properties.get(symbol)
	}

	/// Первое по алфавиту определение выражения с данным атрибутом.
	pub fn definition_with_attribute(&self, attribute: &str) -> Option<&Arc<ExpressionDefinition>> {
		self.expressions.values().find(|definition| definition.has_attribute(attribute))
	}
}
