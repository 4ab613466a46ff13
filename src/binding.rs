use crate::expr::*;
use crate::position::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Одна запись о совпадении шаблона с выражением.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MatchResult {
	/// Паттерн `pattern_name` совпал с `expression`, которое лежит по пути `path`. В `bound_variable_scopes` лежат области видимости связанных переменных в этом месте, ближайшая последняя.
	Binding {
		pattern_name: String,
		expression: Expression,
		path: TreePathBuf,
		bound_variable_scopes: Vec<Vec<String>>,
	},
	/// Связанная переменная шаблона `template_name` соответствует переменной `matched_name` выражения по пути `path`.
	BoundVariable {
		template_name: String,
		matched_name: String,
		index: usize,
		path: TreePathBuf,
	},
}

impl fmt::Display for MatchResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MatchResult::Binding { pattern_name, expression, path, .. } => write!(f, "{} := {} at {}", pattern_name, expression, path),
			MatchResult::BoundVariable { template_name, matched_name, index, path } => {
				write!(f, "bound #{} {} := {} at {}", index, template_name, matched_name, path)
			},
		}
	}
}

/// Сопоставить шаблон с выражением целиком.
pub fn match_template(template: &Expression, expression: &Expression) -> Option<Vec<MatchResult>> {
	match_template_at(template, expression, TreePath::root(), &[])
}

/// Сопоставить шаблон с выражением, которое лежит по пути `path` внутри `scopes` областей видимости связанных переменных.
pub fn match_template_at(
	template: &Expression,
	expression: &Expression,
	path: &TreePath,
	scopes: &[Vec<String>],
) -> Option<Vec<MatchResult>> {
	use Expression::*;

	if let Some(name) = template.as_pattern_variable() {
		return Some(vec![MatchResult::Binding {
			pattern_name: name.to_string(),
			expression: expression.clone(),
			path: path.to_owned(),
			bound_variable_scopes: scopes.to_vec(),
		}]);
	}

	let results = match (template, expression) {
		(
			Defined { definition: template_definition, bound_variables: template_bound, components: template_components },
			Defined { definition, bound_variables, components },
		) if Arc::ptr_eq(template_definition, definition)
			&& template_components.len() == components.len()
			&& template_bound.len() == bound_variables.len() =>
		{
			let mut inner_scopes = scopes.to_vec();
			if !bound_variables.is_empty() {
				inner_scopes.push(bound_variables.clone());
			}

			let mut results = Vec::new();
			for (index, (template_component, component)) in template_components.iter().zip(components).enumerate() {
				results.extend(match_template_at(template_component, component, &path.child(index), &inner_scopes)?);
			}
			for (index, (template_name, matched_name)) in template_bound.iter().zip(bound_variables).enumerate() {
				results.push(MatchResult::BoundVariable {
					template_name: template_name.clone(),
					matched_name: matched_name.clone(),
					index,
					path: path.to_owned(),
				});
			}
			results
		},
		(Type(template_type), Type(concrete)) if Arc::ptr_eq(&template_type.definition, &concrete.definition)
			&& template_type.qualifier_components.len() == concrete.qualifier_components.len() =>
		{
			let mut results = match_template_at(&template_type.term, &concrete.term, &path.join(&concrete.term_path()), scopes)?;
			let pairs = template_type.qualifier_components.iter().zip(&concrete.qualifier_components);
			for (index, (template_component, component)) in pairs.enumerate() {
				let component_path = path.join(&concrete.qualifier_component_path(index));
				results.extend(match_template_at(template_component, component, &component_path, scopes)?);
			}
			results
		},
		(FunctionParameter { level, index }, FunctionParameter { level: matched_level, index: matched_index })
			if level == matched_level && index == matched_index =>
		{
			Vec::new()
		},
		_ => return None,
	};

	BindingStorage::from_results(&results)?;
	Some(results)
}

/// Значения паттернов и имена связанных переменных, собранные из записей о совпадении.
#[derive(Default, Debug, Clone)]
pub struct BindingStorage {
	values: BTreeMap<String, Expression>,
	depths: BTreeMap<String, usize>,
	bound_names: BTreeMap<String, String>,
}

impl BindingStorage {
	/// Добавляет биндинг в хранилище. Если он уже существует, то проверяет что строковые формы совпадают. Если это не так, возвращает None.
	pub fn add(&mut self, pattern_name: &str, expression: &Expression) -> Option<()> {
		use std::collections::btree_map::Entry::*;

		match self.values.entry(pattern_name.to_string()) {
			Vacant(vacant) => {
				vacant.insert(expression.clone());
				Some(())
			},
			Occupied(occupied) => {
				if occupied.get().serialize() == expression.serialize() {
					Some(())
				} else {
					None
				}
			},
		}
	}

	/// Собирает хранилище из записей. Первое значение паттерна остаётся, повторные должны с ним совпадать.
	pub fn from_results(results: &[MatchResult]) -> Option<Self> {
		let mut storage = BindingStorage::default();
		for result in results {
			match result {
				MatchResult::Binding { pattern_name, expression, bound_variable_scopes, .. } => {
					storage.add(pattern_name, expression)?;
					storage.depths.entry(pattern_name.clone()).or_insert(bound_variable_scopes.len());
				},
				MatchResult::BoundVariable { template_name, matched_name, .. } => {
					storage.bound_names.entry(template_name.clone()).or_insert_with(|| matched_name.clone());
				},
			}
		}
		Some(storage)
	}

	pub fn get(&self, pattern_name: &str) -> Option<&Expression> {
		self.values.get(pattern_name)
	}

	/// Сколько областей видимости было вокруг значения паттерна в месте совпадения.
	pub fn depth(&self, pattern_name: &str) -> Option<usize> {
		self.depths.get(pattern_name).copied()
	}

	pub fn bound_name(&self, template_name: &str) -> Option<&str> {
		self.bound_names.get(template_name).map(String::as_str)
	}
}

/// Подставить значения паттернов в шаблон. Паттерны без значения и связанные переменные без соответствия остаются как есть.
///
/// Если паттерн в шаблоне лежит под другим числом областей видимости, чем его значение в месте совпадения, ссылки значения на внешние связанные переменные сдвигаются на разницу.
pub fn apply_bindings(template: &Expression, storage: &BindingStorage) -> Result<Expression, EditError> {
	instantiate(template, storage, 0)
}

fn instantiate(template: &Expression, storage: &BindingStorage, depth: usize) -> Result<Expression, EditError> {
	if let Some(name) = template.as_pattern_variable() {
		if let Some(found) = storage.get(name) {
			let matched_depth = storage.depth(name).unwrap_or(depth);
			let amount = depth as isize - matched_depth as isize;
			return found.shift_free_parameters(amount).ok_or_else(|| EditError::EscapingParameter {
				pattern_name: name.to_string(),
			});
		}
	}

	let inner_depth = match template {
		Expression::Defined { bound_variables, .. } if !bound_variables.is_empty() => depth + 1,
		_ => depth,
	};
	let mut error = None;
	let result = template.map_children(|child| {
		instantiate(child, storage, inner_depth).unwrap_or_else(|failure| {
			error.get_or_insert(failure);
			child.clone()
		})
	});
	if let Some(error) = error {
		return Err(error);
	}

	Ok(match result {
		Expression::Defined { definition, bound_variables, components } => Expression::Defined {
			definition,
			bound_variables: bound_variables
				.iter()
				.map(|name| storage.bound_name(name).unwrap_or(name).to_string())
				.collect(),
			components,
		},
		other => other,
	})
}

/// Имена всех паттернов шаблона.
pub fn pattern_names(template: &Expression) -> BTreeSet<String> {
	let mut names = BTreeSet::new();
	collect_pattern_names(template, &mut names);
	names
}

fn collect_pattern_names(template: &Expression, names: &mut BTreeSet<String>) {
	if let Some(name) = template.as_pattern_variable() {
		names.insert(name.to_string());
		return;
	}
	template.map_children(|child| {
		collect_pattern_names(child, names);
		child.clone()
	});
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FormulaError {
	#[error("right side uses patterns that left side doesn't bind: {}", names.join(", "))]
	UnboundPatterns {
		names: Vec<String>,
	},
}

/// `left <-> right`
#[derive(Clone, Debug)]
pub struct Formula {
	pub left: Expression,
	pub right: Expression,
}

impl Formula {
	/// Правило переписывания слева направо. Каждый паттерн правой части должен встречаться в левой.
	pub fn new(left: Expression, right: Expression) -> Result<Self, FormulaError> {
		let bound = pattern_names(&left);
		let names: Vec<String> = pattern_names(&right).difference(&bound).cloned().collect();
		if names.is_empty() {
			Ok(Formula { left, right })
		} else {
			Err(FormulaError::UnboundPatterns { names })
		}
	}

	/// То же правило справа налево.
	pub fn reversed(&self) -> Result<Self, FormulaError> {
		Formula::new(self.right.clone(), self.left.clone())
	}

	/// Применить правило к части `expression` по пути `path`. `Ok(None)`, если левая часть там не совпала.
	pub fn apply_at(&self, expression: &Expression, path: &TreePath) -> Result<Option<(Expression, Vec<TreePathBuf>)>, EditError> {
		let target = expression.subexpression(path)?;
		let storage = match match_template(&self.left, &target).and_then(|results| BindingStorage::from_results(&results)) {
			Some(storage) => storage,
			None => return Ok(None),
		};

		let replacement = apply_bindings(&self.right, &storage)?;
		tracing::debug!(%path, %replacement, "applying formula");
		expression.replace_at_path(path, replacement).map(Some)
	}
}
