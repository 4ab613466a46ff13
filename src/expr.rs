use crate::definitions::*;
use crate::format;
use crate::position::*;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;
use std::iter;
use std::sync::Arc;
use thiserror::Error;

/// Выражение. Набор вариантов закрыт, а грамматика, по которой они получаются, задаётся таблицами символов.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Expression {
	/// Свободная переменная, возможно применённая к аргументам. В тексте выглядит как `x` или `with (a b) f`.
	Variable {
		name: String,
		/// Суффикс, различающий одинаково выглядящие имена. Влияет только на отображение.
		disambiguator: Option<String>,
		components: Vec<Expression>,
	},

	/// Любой символ из таблицы определений выражений. В тексте выглядит как `forall x P $0`.
	Defined {
		definition: Arc<ExpressionDefinition>,
		bound_variables: Vec<String>,
		components: Vec<Expression>,
	},

	/// `term` является объектом типа, возможно с квалификатором, свойствами и связанными объектами.
	Type(TypeExpression),

	TypeQualifier {
		definition: Arc<TypeQualifierDefinition>,
		parent: Arc<TypeDefinition>,
		term: Box<Expression>,
		components: Vec<Expression>,
	},

	Property {
		definition: Arc<PropertyDefinition>,
		parent: Arc<TypeDefinition>,
		term: Box<Expression>,
		components: Vec<Expression>,
	},

	/// `term` является объектом `definition` для `parent_term`.
	RelatedObject {
		definition: Arc<RelatedObjectDefinition>,
		parent: Arc<TypeDefinition>,
		term: Box<Expression>,
		parent_term: Box<Expression>,
		components: Vec<Expression>,
	},

	TypeRelation {
		definition: Arc<TypeRelationDefinition>,
		first: Box<Expression>,
		second: Box<Expression>,
	},

	StandaloneProperty {
		definition: Arc<StandalonePropertyDefinition>,
		term: Box<Expression>,
	},

	/// Ссылка на связанную переменную: `level` областей видимости пропускается начиная с ближайшей, `index` выбирает переменную внутри области. В тексте выглядит как `$0`, `$$1`.
	FunctionParameter {
		level: usize,
		index: usize,
	},
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Copy)]
pub enum ExpressionKind {
	Variable,
	Defined,
	Type,
	TypeQualifier,
	Property,
	RelatedObject,
	TypeRelation,
	StandaloneProperty,
	FunctionParameter,
}

impl From<&Expression> for ExpressionKind {
	fn from(expr: &Expression) -> Self {
		use Expression::*;

		match expr {
			Variable { .. } => ExpressionKind::Variable,
			Defined { .. } => ExpressionKind::Defined,
			Type(_) => ExpressionKind::Type,
			TypeQualifier { .. } => ExpressionKind::TypeQualifier,
			Property { .. } => ExpressionKind::Property,
			RelatedObject { .. } => ExpressionKind::RelatedObject,
			TypeRelation { .. } => ExpressionKind::TypeRelation,
			StandaloneProperty { .. } => ExpressionKind::StandaloneProperty,
			FunctionParameter { .. } => ExpressionKind::FunctionParameter,
		}
	}
}

/// Свойство или связанный объект, слитые в выражение типа.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TypeAttachment {
	Property(Arc<PropertyDefinition>),
	RelatedObject {
		definition: Arc<RelatedObjectDefinition>,
		term: Expression,
	},
}

impl TypeAttachment {
	pub fn symbol(&self) -> &str {
		match self {
			TypeAttachment::Property(definition) => &definition.symbol,
			TypeAttachment::RelatedObject { definition, .. } => &definition.symbol,
		}
	}

	pub fn required_qualifier(&self) -> Option<&str> {
		match self {
			TypeAttachment::Property(definition) => definition.required_qualifier.as_deref(),
			TypeAttachment::RelatedObject { definition, .. } => definition.required_qualifier.as_deref(),
		}
	}

	/// Индекс, с которого в узле вложения начинаются компоненты квалификатора.
	fn qualifier_offset(&self) -> usize {
		match self {
			TypeAttachment::Property(_) => 1,
			TypeAttachment::RelatedObject { .. } => 2,
		}
	}

	/// Индекс терма выражения типа внутри узла вложения.
	fn shared_term_index(&self) -> usize {
		match self {
			TypeAttachment::Property(_) => 0,
			TypeAttachment::RelatedObject { .. } => 1,
		}
	}
}

/// Выражение типа. Свойства и связанные объекты хранятся плоским списком, но адресуются путями развёрнутой конъюнкции, см. `TypeExpression::unfold`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TypeExpression {
	pub definition: Arc<TypeDefinition>,
	pub term: Box<Expression>,
	pub explicit_qualifier: Option<Arc<TypeQualifierDefinition>>,
	/// Компоненты явного квалификатора, если он есть, иначе квалификатора по умолчанию.
	pub qualifier_components: Vec<Expression>,
	pub attachments: Vec<TypeAttachment>,
	/// Определение, которым были соединены слитые части.
	pub conjunction: Option<Arc<ExpressionDefinition>>,
}

/// Место внутри выражения типа, которое можно заменить.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TypeSlot {
	Term,
	QualifierComponent(usize),
	/// Собственный терм связанного объекта номер `n`. Есть только в одном месте.
	ObjectTerm(usize),
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EditError {
	#[error("can't edit inside {kind:?} below its root, replace the whole node instead")]
	UnsupportedReplacement {
		kind: ExpressionKind,
	},
	#[error("{kind:?} has no bound variables to rename")]
	UnsupportedBoundVariableRename {
		kind: ExpressionKind,
	},
	#[error("index {index} at depth {depth} is out of range")]
	PathOutOfRange {
		depth: usize,
		index: usize,
	},
	#[error("value of pattern {pattern_name} refers to a bound variable that isn't in scope after rewriting")]
	EscapingParameter {
		pattern_name: String,
	},
}

/// Как показывать имена свободных переменных человеку.
#[derive(Clone, Debug, Default)]
pub struct VariableNaming {
	pub display_names: BTreeMap<String, String>,
}

impl VariableNaming {
	pub fn display(&self, name: &str, disambiguator: Option<&str>) -> String {
		let base = self.display_names.get(name).map(String::as_str).unwrap_or(name);
		match disambiguator {
			Some(disambiguator) => format!("{}_{}", base, disambiguator),
			None => base.to_string(),
		}
	}
}

/// Значения для подстановки в строки отображения.
#[derive(Default)]
struct Placeholders {
	named: Vec<(&'static str, String)>,
	components: Vec<String>,
	bound_variables: Vec<String>,
}

impl Placeholders {
	fn lookup(&self, name: &str) -> Option<String> {
		if let Some((_, value)) = self.named.iter().find(|(key, _)| *key == name) {
			return Some(value.clone());
		}
		if let Some(index) = name.strip_prefix('v') {
			return index.parse::<usize>().ok().and_then(|index| self.bound_variables.get(index).cloned());
		}
		name.parse::<usize>().ok().and_then(|index| self.components.get(index).cloned())
	}

	fn render(&self, format: &str) -> String {
		format::render(format, |name| self.lookup(name))
	}
}

/// `({0}, {1}, ...)` для `count` компонент или пустая строка.
fn components_placeholder(count: usize) -> String {
	if count == 0 {
		String::new()
	} else {
		format!("({})", (0..count).map(|index| format!("{{{}}}", index)).join(", "))
	}
}

fn prefixed<'a>(symbol: &str, parts: impl Iterator<Item = &'a Expression>) -> String {
	iter::once(symbol.to_string())
		.chain(parts.map(Expression::serialize))
		.join(" ")
}

fn rebuild_component<F>(
	components: &[Expression],
	index: usize,
	tail: &TreePath,
	depth: usize,
	at_target: &mut F,
) -> Result<(Vec<Expression>, Vec<TreePathBuf>), EditError>
where
	F: FnMut(&Expression) -> Result<Expression, EditError>,
{
	let component = components.get(index).ok_or(EditError::PathOutOfRange { depth, index })?;
	let (replaced, paths) = component.rebuild_at(tail, depth + 1, at_target)?;
	let mut components = components.to_vec();
	components[index] = replaced;
	Ok((components, paths))
}

impl Expression {
	pub fn variable(name: impl Into<String>) -> Self {
		Expression::Variable {
			name: name.into(),
			disambiguator: None,
			components: Vec::new(),
		}
	}

	pub fn kind(&self) -> ExpressionKind {
		ExpressionKind::from(self)
	}

	/// Переменная без аргументов. В шаблоне это паттерн, который матчится с чем угодно.
	pub fn as_pattern_variable(&self) -> Option<&str> {
		match self {
			Expression::Variable { name, components, .. } if components.is_empty() => Some(name),
			_ => None,
		}
	}

	/// Текстовая форма, которую снова можно разобрать парсером.
	pub fn serialize(&self) -> String {
		use Expression::*;

		match self {
			Variable { name, components, .. } => {
				if components.is_empty() {
					name.clone()
				} else {
					format!("with ({}) {}", components.iter().map(Expression::serialize).join(" "), name)
				}
			},
			Defined { definition, bound_variables, components } => iter::once(definition.symbol.clone())
				.chain(bound_variables.iter().cloned())
				.chain(components.iter().map(Expression::serialize))
				.join(" "),
			Type(expression) if expression.is_folded() => expression.unfold().serialize(),
			Type(expression) => prefixed(
				&expression.definition.symbol,
				iter::once(&*expression.term).chain(&expression.qualifier_components),
			),
			TypeQualifier { definition, term, components, .. } => prefixed(&definition.symbol, iter::once(&**term).chain(components)),
			Property { definition, term, components, .. } => prefixed(&definition.symbol, iter::once(&**term).chain(components)),
			RelatedObject { definition, term, parent_term, components, .. } => prefixed(
				&definition.symbol,
				iter::once(&**term).chain(iter::once(&**parent_term)).chain(components),
			),
			TypeRelation { definition, first, second } => prefixed(&definition.symbol, iter::once(&**first).chain(iter::once(&**second))),
			StandaloneProperty { definition, term } => prefixed(&definition.symbol, iter::once(&**term)),
			FunctionParameter { level, index } => format!("{}{}", "$".repeat(level + 1), index),
		}
	}

	fn needs_brackets(&self) -> bool {
		match self {
			Expression::Defined { definition, .. } => definition.requires_brackets,
			Expression::Type(expression) if expression.is_folded() => expression
				.conjunction
				.as_ref()
				.map(|conjunction| conjunction.requires_brackets)
				.unwrap_or(false),
			_ => false,
		}
	}

	fn serialize_component_nicely(&self, scopes: &[Vec<String>], naming: &VariableNaming) -> String {
		let result = self.serialize_nicely(scopes, naming);
		if self.needs_brackets() {
			format!("({})", result)
		} else {
			result
		}
	}

	/// Форма для человека. В `scopes` лежат имена связанных переменных объемлющих областей, ближайшая область последняя. Обратно не парсится.
	pub fn serialize_nicely(&self, scopes: &[Vec<String>], naming: &VariableNaming) -> String {
		use Expression::*;

		let nice = |expression: &Expression| expression.serialize_component_nicely(scopes, naming);

		match self {
			Variable { name, disambiguator, components } => {
				let name = naming.display(name, disambiguator.as_deref());
				if components.is_empty() {
					name
				} else {
					format!("{}({})", name, components.iter().map(nice).join(", "))
				}
			},
			Defined { definition, bound_variables, components } => {
				let mut inner_scopes = scopes.to_vec();
				if !bound_variables.is_empty() {
					inner_scopes.push(bound_variables.clone());
				}
				let placeholders = Placeholders {
					named: vec![],
					components: components
						.iter()
						.map(|component| component.serialize_component_nicely(&inner_scopes, naming))
						.collect(),
					bound_variables: bound_variables.clone(),
				};
				match &definition.format {
					Some(format) => placeholders.render(format),
					None if bound_variables.is_empty() && components.is_empty() => definition.symbol.clone(),
					None if bound_variables.is_empty() => format!("{}({})", definition.symbol, placeholders.components.join(", ")),
					None => format!(
						"{}[{}]({})",
						definition.symbol,
						bound_variables.join(", "),
						placeholders.components.join(", ")
					),
				}
			},
			Type(expression) if expression.is_folded() => expression.unfold().serialize_nicely(scopes, naming),
			Type(expression) => {
				let placeholders = Placeholders {
					named: vec![("term", nice(&expression.term))],
					components: expression.qualifier_components.iter().map(nice).collect(),
					bound_variables: vec![],
				};
				let default = format!("{{term}} is a {}", expression.definition.symbol);
				let mut result = placeholders.render(expression.definition.format.as_deref().unwrap_or(&default));
				if !placeholders.components.is_empty() {
					let qualifier_format = expression
						.definition
						.default_qualifier
						.as_ref()
						.and_then(|qualifier| qualifier.format.clone())
						.unwrap_or_else(|| components_placeholder(placeholders.components.len()));
					result.push(' ');
					result.push_str(&placeholders.render(&qualifier_format));
				}
				result
			},
			TypeQualifier { definition, term, components, .. } => {
				let placeholders = Placeholders {
					named: vec![("term", nice(term))],
					components: components.iter().map(nice).collect(),
					bound_variables: vec![],
				};
				let default = format!("{{term}} is {}{}", definition.symbol, components_placeholder(components.len()));
				placeholders.render(definition.format.as_deref().unwrap_or(&default))
			},
			Property { definition, term, components, .. } => {
				let placeholders = Placeholders {
					named: vec![("term", nice(term))],
					components: components.iter().map(nice).collect(),
					bound_variables: vec![],
				};
				let default = format!("{{term}} is {}{}", definition.symbol, components_placeholder(components.len()));
				placeholders.render(definition.format.as_deref().unwrap_or(&default))
			},
			RelatedObject { definition, term, parent_term, components, .. } => {
				let placeholders = Placeholders {
					named: vec![("term", nice(term)), ("parent", nice(parent_term))],
					components: components.iter().map(nice).collect(),
					bound_variables: vec![],
				};
				let default = format!("{{term}} is {} of {{parent}}{}", definition.symbol, components_placeholder(components.len()));
				placeholders.render(definition.format.as_deref().unwrap_or(&default))
			},
			TypeRelation { definition, first, second } => {
				let placeholders = Placeholders {
					named: vec![("first", nice(first)), ("second", nice(second))],
					..Placeholders::default()
				};
				let default = format!("{{first}} {} {{second}}", definition.symbol);
				placeholders.render(definition.format.as_deref().unwrap_or(&default))
			},
			StandaloneProperty { definition, term } => {
				let placeholders = Placeholders {
					named: vec![("term", nice(term))],
					..Placeholders::default()
				};
				let default = format!("{{term}} {}", definition.symbol);
				placeholders.render(definition.format.as_deref().unwrap_or(&default))
			},
			FunctionParameter { level, index } => scopes
				.len()
				.checked_sub(level + 1)
				.and_then(|scope| scopes[scope].get(*index))
				.cloned()
				.unwrap_or_else(|| self.serialize()),
		}
	}

	/// Для выражения типа со слитыми частями возвращает эквивалентное дерево без слияния, для остальных выражений копию.
	pub fn unfold(&self) -> Expression {
		match self {
			Expression::Type(expression) if expression.is_folded() => expression.unfold(),
			other => other.clone(),
		}
	}

	/// Непосредственные дети в порядке путей. Для выражения типа со слитыми частями пути идут по `unfold`.
	fn children(&self) -> Vec<&Expression> {
		use Expression::*;

		match self {
			Variable { components, .. } | Defined { components, .. } => components.iter().collect(),
			Type(expression) => iter::once(&*expression.term).chain(&expression.qualifier_components).collect(),
			TypeQualifier { term, components, .. } | Property { term, components, .. } => {
				iter::once(&**term).chain(components).collect()
			},
			RelatedObject { term, parent_term, components, .. } => iter::once(&**term)
				.chain(iter::once(&**parent_term))
				.chain(components)
				.collect(),
			TypeRelation { first, second, .. } => vec![&**first, &**second],
			StandaloneProperty { term, .. } => vec![&**term],
			FunctionParameter { .. } => vec![],
		}
	}

	fn subexpression_at(&self, path: &TreePath, depth: usize) -> Result<Expression, EditError> {
		let (index, tail) = match path.split_first() {
			Some(split) => split,
			None => return Ok(self.clone()),
		};

		if let Expression::Type(expression) = self {
			if expression.is_folded() {
				return expression.unfold().subexpression_at(path, depth);
			}
		}

		self.children()
			.into_iter()
			.nth(index)
			.ok_or(EditError::PathOutOfRange { depth, index })?
			.subexpression_at(tail, depth + 1)
	}

	/// Часть выражения по пути.
	pub fn subexpression(&self, path: &TreePath) -> Result<Expression, EditError> {
		self.subexpression_at(path, 0)
	}

	/// Общий спуск по пути для замены и переименования: пересобирает все узлы на пути, узел в конце пути строит `at_target`. Возвращает все пути, по которым новый узел оказался в результате.
	fn rebuild_at<F>(&self, path: &TreePath, depth: usize, at_target: &mut F) -> Result<(Expression, Vec<TreePathBuf>), EditError>
	where
		F: FnMut(&Expression) -> Result<Expression, EditError>,
	{
		use Expression::*;

		let (index, tail) = match path.split_first() {
			Some(split) => split,
			None => return Ok((at_target(self)?, vec![TreePathBuf::new()])),
		};
		let step = [index];
		let step = TreePath::from_slice(&step);

		match self {
			Variable { name, disambiguator, components } => {
				let (components, paths) = rebuild_component(components, index, tail, depth, at_target)?;
				let result = Variable {
					name: name.clone(),
					disambiguator: disambiguator.clone(),
					components,
				};
				Ok((result, prefix_all(step, paths)))
			},
			Defined { definition, bound_variables, components } => {
				let (components, paths) = rebuild_component(components, index, tail, depth, at_target)?;
				let result = Defined {
					definition: definition.clone(),
					bound_variables: bound_variables.clone(),
					components,
				};
				Ok((result, prefix_all(step, paths)))
			},
			TypeQualifier { definition, parent, term, components } => {
				let (term, components, paths) = match index {
					0 => {
						let (term, paths) = term.rebuild_at(tail, depth + 1, at_target)?;
						(Box::new(term), components.clone(), paths)
					},
					index if index <= components.len() => {
						let (components, paths) = rebuild_component(components, index - 1, tail, depth, at_target)?;
						(term.clone(), components, paths)
					},
					index => return Err(EditError::PathOutOfRange { depth, index }),
				};
				let result = TypeQualifier {
					definition: definition.clone(),
					parent: parent.clone(),
					term,
					components,
				};
				Ok((result, prefix_all(step, paths)))
			},
			Type(expression) => {
				let (expression, paths) = expression.rebuild_at(path, depth, at_target)?;
				Ok((Type(expression), paths))
			},
			Property { .. } |
			RelatedObject { .. } |
			TypeRelation { .. } |
			StandaloneProperty { .. } |
			FunctionParameter { .. } => Err(EditError::UnsupportedReplacement { kind: self.kind() }),
		}
	}

	/// Заменить часть выражения по пути. Второй элемент результата содержит все пути, где теперь находится `replacement`: внутри выражения типа одна замена может оказаться в нескольких местах.
	pub fn replace_at_path(&self, path: &TreePath, replacement: Expression) -> Result<(Expression, Vec<TreePathBuf>), EditError> {
		self.rebuild_at(path, 0, &mut |_: &Expression| Ok(replacement.clone()))
	}

	/// Переименовать связанную переменную номер `variable_index` у выражения по пути `path`. Ссылки на переменные не зависят от имён, поэтому больше ничего не меняется.
	pub fn rename_bound_variable(&self, new_name: &str, variable_index: usize, path: &TreePath) -> Result<Expression, EditError> {
		let depth = path.len();
		let mut rename = |target: &Expression| match target {
			Expression::Defined { definition, bound_variables, components } if !bound_variables.is_empty() => {
				if variable_index >= bound_variables.len() {
					return Err(EditError::PathOutOfRange { depth, index: variable_index });
				}
				let mut bound_variables = bound_variables.clone();
				bound_variables[variable_index] = new_name.to_string();
				Ok(Expression::Defined {
					definition: definition.clone(),
					bound_variables,
					components: components.clone(),
				})
			},
			other => Err(EditError::UnsupportedBoundVariableRename { kind: other.kind() }),
		};
		self.rebuild_at(path, 0, &mut rename).map(|(expression, _)| expression)
	}

	/// Применить `f` к каждому непосредственному ребёнку, сохранив остальное. У выражения типа детьми считаются терм, компоненты квалификатора и термы связанных объектов.
	pub fn map_children<F>(&self, mut f: F) -> Expression
	where
		F: FnMut(&Expression) -> Expression,
	{
		use Expression::*;

		match self {
			Variable { name, disambiguator, components } => Variable {
				name: name.clone(),
				disambiguator: disambiguator.clone(),
				components: components.iter().map(&mut f).collect(),
			},
			Defined { definition, bound_variables, components } => Defined {
				definition: definition.clone(),
				bound_variables: bound_variables.clone(),
				components: components.iter().map(&mut f).collect(),
			},
			Type(expression) => {
				let term = Box::new(f(&expression.term));
				let qualifier_components = expression.qualifier_components.iter().map(&mut f).collect();
				let attachments = expression
					.attachments
					.iter()
					.map(|attachment| match attachment {
						TypeAttachment::Property(definition) => TypeAttachment::Property(definition.clone()),
						TypeAttachment::RelatedObject { definition, term } => TypeAttachment::RelatedObject {
							definition: definition.clone(),
							term: f(term),
						},
					})
					.collect();
				Type(TypeExpression {
					definition: expression.definition.clone(),
					term,
					explicit_qualifier: expression.explicit_qualifier.clone(),
					qualifier_components,
					attachments,
					conjunction: expression.conjunction.clone(),
				})
			},
			TypeQualifier { definition, parent, term, components } => TypeQualifier {
				definition: definition.clone(),
				parent: parent.clone(),
				term: Box::new(f(term)),
				components: components.iter().map(&mut f).collect(),
			},
			Property { definition, parent, term, components } => Property {
				definition: definition.clone(),
				parent: parent.clone(),
				term: Box::new(f(term)),
				components: components.iter().map(&mut f).collect(),
			},
			RelatedObject { definition, parent, term, parent_term, components } => RelatedObject {
				definition: definition.clone(),
				parent: parent.clone(),
				term: Box::new(f(term)),
				parent_term: Box::new(f(parent_term)),
				components: components.iter().map(&mut f).collect(),
			},
			TypeRelation { definition, first, second } => TypeRelation {
				definition: definition.clone(),
				first: Box::new(f(first)),
				second: Box::new(f(second)),
			},
			StandaloneProperty { definition, term } => StandaloneProperty {
				definition: definition.clone(),
				term: Box::new(f(term)),
			},
			FunctionParameter { level, index } => FunctionParameter { level: *level, index: *index },
		}
	}

	/// Заменить свободные переменные из `names` ссылками на связанные переменные новой области видимости, которая станет ближайшей снаружи этого выражения.
	pub fn bind_free_variables(&self, names: &[String]) -> Expression {
		self.bind_at_level(names, 0)
	}

	/// Сдвинуть уровни ссылок на связанные переменные, объявленные снаружи выражения, на `amount`. None, если какая-то ссылка ушла бы за ближайшую область.
	pub fn shift_free_parameters(&self, amount: isize) -> Option<Expression> {
		self.shift_above(amount, 0)
	}

	fn shift_above(&self, amount: isize, local: usize) -> Option<Expression> {
		match self {
			Expression::FunctionParameter { level, index } if *level >= local => Some(Expression::FunctionParameter {
				level: local + (*level - local).checked_add_signed(amount)?,
				index: *index,
			}),
			_ => {
				let local = match self {
					Expression::Defined { bound_variables, .. } if !bound_variables.is_empty() => local + 1,
					_ => local,
				};
				let mut failed = false;
				let shifted = self.map_children(|child| {
					child.shift_above(amount, local).unwrap_or_else(|| {
						failed = true;
						child.clone()
					})
				});
				if failed {
					None
				} else {
					Some(shifted)
				}
			},
		}
	}

	fn bind_at_level(&self, names: &[String], level: usize) -> Expression {
		match self {
			Expression::Variable { name, components, .. } if components.is_empty() => {
				match names.iter().position(|bound| bound == name) {
					Some(index) => Expression::FunctionParameter { level, index },
					None => self.clone(),
				}
			},
			Expression::Defined { bound_variables, .. } if !bound_variables.is_empty() => {
				self.map_children(|child| child.bind_at_level(names, level + 1))
			},
			_ => self.map_children(|child| child.bind_at_level(names, level)),
		}
	}
}

impl fmt::Display for Expression {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.serialize())
	}
}

impl TypeExpression {
	/// Выражение типа без слитых частей.
	pub fn new(definition: Arc<TypeDefinition>, term: Expression, qualifier_components: Vec<Expression>) -> Self {
		TypeExpression {
			definition,
			term: Box::new(term),
			explicit_qualifier: None,
			qualifier_components,
			attachments: Vec::new(),
			conjunction: None,
		}
	}

	pub fn is_folded(&self) -> bool {
		self.explicit_qualifier.is_some() || !self.attachments.is_empty()
	}

	pub fn properties(&self) -> impl Iterator<Item = &Arc<PropertyDefinition>> {
		self.attachments.iter().filter_map(|attachment| match attachment {
			TypeAttachment::Property(definition) => Some(definition),
			TypeAttachment::RelatedObject { .. } => None,
		})
	}

	pub fn related_objects(&self) -> impl Iterator<Item = (&Arc<RelatedObjectDefinition>, &Expression)> {
		self.attachments.iter().filter_map(|attachment| match attachment {
			TypeAttachment::Property(_) => None,
			TypeAttachment::RelatedObject { definition, term } => Some((definition, term)),
		})
	}

	/// Использует ли вложение квалификатор типа. Если использует, то его компоненты совпадают с `qualifier_components`.
	pub fn uses_qualifier(&self, attachment: &TypeAttachment) -> bool {
		attachment.required_qualifier().is_some() || self.definition.default_qualifier.is_some()
	}

	fn explicit_qualifier_count(&self) -> usize {
		if self.explicit_qualifier.is_some() { 1 } else { 0 }
	}

	/// Путь к узлу самого типа в развёрнутой конъюнкции.
	fn main_prefix(&self) -> TreePathBuf {
		TreePathBuf::zeros(self.attachments.len() + self.explicit_qualifier_count())
	}

	pub fn term_path(&self) -> TreePathBuf {
		self.main_prefix().then(0)
	}

	pub fn explicit_qualifier_path(&self) -> Option<TreePathBuf> {
		self.explicit_qualifier
			.as_ref()
			.map(|_| TreePathBuf::zeros(self.attachments.len()).then(1))
	}

	/// Путь к вложению номер `index`, считая от начала.
	pub fn attachment_path(&self, index: usize) -> TreePathBuf {
		TreePathBuf::zeros(self.attachments.len() - index - 1).then(1)
	}

	pub fn qualifier_component_path(&self, index: usize) -> TreePathBuf {
		match self.explicit_qualifier_path() {
			Some(path) => path.then(1 + index),
			None => self.main_prefix().then(1 + index),
		}
	}

	/// Все места в развёрнутой конъюнкции, где находится значение `slot`: сначала основное, потом вложения по порядку.
	fn slot_paths(&self, slot: TypeSlot) -> Vec<TreePathBuf> {
		let mut result = Vec::new();
		match slot {
			TypeSlot::Term => {
				result.push(self.term_path());
				if let Some(path) = self.explicit_qualifier_path() {
					result.push(path.then(0));
				}
				for (index, attachment) in self.attachments.iter().enumerate() {
					result.push(self.attachment_path(index).then(attachment.shared_term_index()));
				}
			},
			TypeSlot::QualifierComponent(component) => {
				result.push(self.qualifier_component_path(component));
				for (index, attachment) in self.attachments.iter().enumerate() {
					if self.uses_qualifier(attachment) {
						result.push(self.attachment_path(index).then(attachment.qualifier_offset() + component));
					}
				}
			},
			TypeSlot::ObjectTerm(index) => result.push(self.attachment_path(index).then(0)),
		}
		result
	}

	fn qualifier_slot(&self, index: usize, depth: usize, path_index: usize) -> Result<TypeSlot, EditError> {
		if index < self.qualifier_components.len() {
			Ok(TypeSlot::QualifierComponent(index))
		} else {
			Err(EditError::PathOutOfRange { depth, index: path_index })
		}
	}

	/// Найти по непустому пути заменяемое место. Возвращает место, остаток пути и глубину, на которой этот остаток начинается.
	fn resolve_slot<'p>(&self, path: &'p TreePath, depth: usize) -> Result<(TypeSlot, &'p TreePath, usize), EditError> {
		let unsupported = EditError::UnsupportedReplacement { kind: ExpressionKind::Type };
		let mut rest = path;
		let mut depth = depth;

		for level in 0..self.attachments.len() {
			let (index, tail) = rest.split_first().ok_or_else(|| unsupported.clone())?;
			match index {
				0 => {
					rest = tail;
					depth += 1;
				},
				1 => {
					let attachment = &self.attachments[self.attachments.len() - 1 - level];
					let (inner, tail) = tail.split_first().ok_or_else(|| unsupported.clone())?;
					let slot = match (attachment, inner) {
						(_, inner) if inner == attachment.shared_term_index() => TypeSlot::Term,
						(TypeAttachment::RelatedObject { .. }, 0) => TypeSlot::ObjectTerm(self.attachments.len() - 1 - level),
						(_, inner) if self.uses_qualifier(attachment) && inner >= attachment.qualifier_offset() => {
							self.qualifier_slot(inner - attachment.qualifier_offset(), depth + 1, inner)?
						},
						(_, inner) => return Err(EditError::PathOutOfRange { depth: depth + 1, index: inner }),
					};
					return Ok((slot, tail, depth + 2));
				},
				index => return Err(EditError::PathOutOfRange { depth, index }),
			}
		}

		if self.explicit_qualifier.is_some() {
			let (index, tail) = rest.split_first().ok_or_else(|| unsupported.clone())?;
			match index {
				0 => {
					rest = tail;
					depth += 1;
				},
				1 => {
					let (inner, tail) = tail.split_first().ok_or_else(|| unsupported.clone())?;
					let slot = match inner {
						0 => TypeSlot::Term,
						inner => self.qualifier_slot(inner - 1, depth + 1, inner)?,
					};
					return Ok((slot, tail, depth + 2));
				},
				index => return Err(EditError::PathOutOfRange { depth, index }),
			}
		}

		let (index, tail) = rest.split_first().ok_or(unsupported)?;
		let slot = match index {
			0 => TypeSlot::Term,
			index if self.explicit_qualifier.is_none() => self.qualifier_slot(index - 1, depth, index)?,
			index => return Err(EditError::PathOutOfRange { depth, index }),
		};
		Ok((slot, tail, depth + 1))
	}

	fn rebuild_at<F>(&self, path: &TreePath, depth: usize, at_target: &mut F) -> Result<(TypeExpression, Vec<TreePathBuf>), EditError>
	where
		F: FnMut(&Expression) -> Result<Expression, EditError>,
	{
		let (slot, rest, depth) = self.resolve_slot(path, depth)?;
		let mut result = self.clone();
		let tails = match slot {
			TypeSlot::Term => {
				let (term, tails) = self.term.rebuild_at(rest, depth, at_target)?;
				result.term = Box::new(term);
				tails
			},
			TypeSlot::QualifierComponent(index) => {
				let (component, tails) = self.qualifier_components[index].rebuild_at(rest, depth, at_target)?;
				result.qualifier_components[index] = component;
				tails
			},
			TypeSlot::ObjectTerm(index) => match &mut result.attachments[index] {
				TypeAttachment::RelatedObject { term, .. } => {
					let (replaced, tails) = term.rebuild_at(rest, depth, at_target)?;
					*term = replaced;
					tails
				},
				TypeAttachment::Property(_) => return Err(EditError::UnsupportedReplacement { kind: ExpressionKind::Type }),
			},
		};
		Ok((result, fan_out(&self.slot_paths(slot), &tails)))
	}

	fn attachment_node(&self, attachment: &TypeAttachment) -> Expression {
		let components = if self.uses_qualifier(attachment) {
			self.qualifier_components.clone()
		} else {
			Vec::new()
		};
		match attachment {
			TypeAttachment::Property(definition) => Expression::Property {
				definition: definition.clone(),
				parent: self.definition.clone(),
				term: self.term.clone(),
				components,
			},
			TypeAttachment::RelatedObject { definition, term } => Expression::RelatedObject {
				definition: definition.clone(),
				parent: self.definition.clone(),
				term: Box::new(term.clone()),
				parent_term: self.term.clone(),
				components,
			},
		}
	}

	/// Дерево, из которого это выражение получилось слиянием: `conj(...conj(conj(Type, Qualifier), A0)..., An)`. Его пути и есть пути внутри выражения типа.
	pub fn unfold(&self) -> Expression {
		let base_components = if self.explicit_qualifier.is_some() {
			Vec::new()
		} else {
			self.qualifier_components.clone()
		};
		let mut result = Expression::Type(TypeExpression::new(
			self.definition.clone(),
			(*self.term).clone(),
			base_components,
		));

		let conjunction = match &self.conjunction {
			Some(conjunction) => conjunction,
			None => return result,
		};
		let conjoin = |left: Expression, right: Expression| Expression::Defined {
			definition: conjunction.clone(),
			bound_variables: Vec::new(),
			components: vec![left, right],
		};

		if let Some(qualifier) = &self.explicit_qualifier {
			result = conjoin(result, Expression::TypeQualifier {
				definition: qualifier.clone(),
				parent: self.definition.clone(),
				term: self.term.clone(),
				components: self.qualifier_components.clone(),
			});
		}
		for attachment in &self.attachments {
			result = conjoin(result, self.attachment_node(attachment));
		}
		result
	}
}
