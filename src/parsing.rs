use crate::definitions::*;
use crate::expr::*;
use crate::utils::span::*;
use std::sync::Arc;
use thiserror::Error;

/// Токен вместе с байтовым диапазоном во входной строке.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Token<'a> {
	pub text: &'a str,
	pub start: usize,
	pub end: usize,
}

impl<'a> Token<'a> {
	pub fn span(&self) -> GlobalSpan {
		GlobalSpan(self.start..self.end)
	}

	/// Скобки всегда отдельные токены и не могут быть ни символом, ни именем.
	pub fn is_bracket(&self) -> bool {
		matches!(self.text, "(" | ")" | "{" | "}")
	}
}

peg::parser!(
	grammar tokenizer() for str {
		pub rule tokens() -> Vec<Token<'input>>
			= _ t:(token() ** _) _ { t }

		rule token() -> Token<'input>
			= start:position!() text:$(['(' | ')' | '{' | '}']) end:position!() { Token { text, start, end } }
			/ start:position!() text:$((!['(' | ')' | '{' | '}'] !whitespace() [_])+) end:position!() { Token { text, start, end } }

		// ровно те символы, для которых `char::is_whitespace` истинно
		rule whitespace() = ['\t'..='\r' | ' ' | '\u{85}' | '\u{a0}' | '\u{1680}' | '\u{2000}'..='\u{200a}' | '\u{2028}' | '\u{2029}' | '\u{202f}' | '\u{205f}' | '\u{3000}']

		rule _() = quiet!{whitespace()*}
	}
);

/// Разбить строку на токены: по пробельным символам, а скобки `(`, `)`, `{`, `}` отдельно, даже если они приклеены к тексту.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
	// любой символ либо пробельный, либо скобка, либо часть слова, поэтому грамматика принимает любую строку
	tokenizer::tokens(input).unwrap_or_default()
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParseError {
	#[error("malformed expression: {reason}")]
	MalformedExpression {
		reason: String,
	},
	#[error("unexpected tokens after the end of expression")]
	TrailingTokens,
	#[error("`{token}` is not a valid parameter reference, expected `$` signs followed by digits")]
	InvalidParameter {
		token: String,
	},
}

fn malformed(reason: impl Into<String>, span: GlobalSpan) -> Spanned<ParseError> {
	Spanned::new(ParseError::MalformedExpression { reason: reason.into() }, span)
}

type Parsed<'t, 'i, T> = Result<(T, &'t [Token<'i>]), Spanned<ParseError>>;

struct ExpressionParser<'a> {
	tables: &'a SymbolTables,
	input_len: usize,
}

/// Разобрать выражение целиком. Грамматика определяется таблицами символов: что делать с токеном, решает то, в какой таблице он найден.
pub fn parse(tables: &SymbolTables, input: &str) -> Result<Expression, Spanned<ParseError>> {
	let tokens = tokenize(input);
	let parser = ExpressionParser {
		tables,
		input_len: input.len(),
	};
	let (expression, rest) = parser.expression(&tokens)?;
	match (rest.first(), rest.last()) {
		(Some(first), Some(last)) => Err(Spanned::new(ParseError::TrailingTokens, GlobalSpan(first.start..last.end))),
		_ => Ok(expression),
	}
}

impl<'a> ExpressionParser<'a> {
	fn pop<'t, 'i>(&self, tokens: &'t [Token<'i>], expected: &str) -> Result<(&'t Token<'i>, &'t [Token<'i>]), Spanned<ParseError>> {
		tokens.split_first().ok_or_else(|| {
			malformed(
				format!("expected {}, found end of input", expected),
				GlobalSpan(self.input_len..self.input_len),
			)
		})
	}

	fn expression<'t, 'i>(&self, tokens: &'t [Token<'i>]) -> Parsed<'t, 'i, Expression> {
		let (token, rest) = self.pop(tokens, "an expression")?;
		let symbol = token.text;
		tracing::trace!(symbol, "parsing token");

		if let Some(definition) = self.tables.expression(symbol) {
			return self.defined(definition, rest);
		}

		if let Some(definition) = self.tables.type_definition(symbol) {
			let (term, rest) = self.expression(rest)?;
			let arity = definition
				.default_qualifier
				.as_ref()
				.map(|qualifier| qualifier.variables.len())
				.unwrap_or(0);
			let (components, rest) = self.components(arity, rest)?;
			let expression = TypeExpression::new(definition.clone(), term, components);
			return Ok((Expression::Type(expression), rest));
		}

		if let Some((definition, parent)) = self.tables.qualifier(symbol) {
			let (term, rest) = self.expression(rest)?;
			let (components, rest) = self.components(definition.variables.len(), rest)?;
			let expression = Expression::TypeQualifier {
				definition: definition.clone(),
				parent: parent.clone(),
				term: Box::new(term),
				components,
			};
			return Ok((expression, rest));
		}

		if let Some((definition, parent)) = self.tables.property(symbol) {
			let (term, rest) = self.expression(rest)?;
			let arity = parent.qualifier_arity(definition.required_qualifier.as_deref());
			let (components, rest) = self.components(arity, rest)?;
			let expression = Expression::Property {
				definition: definition.clone(),
				parent: parent.clone(),
				term: Box::new(term),
				components,
			};
			return Ok((expression, rest));
		}

		if let Some((definition, parent)) = self.tables.related_object(symbol) {
			let (term, rest) = self.expression(rest)?;
			let (parent_term, rest) = self.expression(rest)?;
			let arity = parent.qualifier_arity(definition.required_qualifier.as_deref());
			let (components, rest) = self.components(arity, rest)?;
			let expression = Expression::RelatedObject {
				definition: definition.clone(),
				parent: parent.clone(),
				term: Box::new(term),
				parent_term: Box::new(parent_term),
				components,
			};
			return Ok((expression, rest));
		}

		if let Some(definition) = self.tables.relation(symbol) {
			let (first, rest) = self.expression(rest)?;
			let (second, rest) = self.expression(rest)?;
			let expression = Expression::TypeRelation {
				definition: definition.clone(),
				first: Box::new(first),
				second: Box::new(second),
			};
			return Ok((expression, rest));
		}

		if let Some(definition) = self.tables.standalone_property(symbol) {
			let (term, rest) = self.expression(rest)?;
			let expression = Expression::StandaloneProperty {
				definition: definition.clone(),
				term: Box::new(term),
			};
			return Ok((expression, rest));
		}

		if symbol == WITH {
			return self.application(rest);
		}

		if symbol.starts_with('$') {
			return Ok((function_parameter(token)?, rest));
		}

		if token.is_bracket() {
			return Err(malformed(format!("unexpected `{}`", symbol), token.span()));
		}

		Ok((Expression::variable(symbol), rest))
	}

	fn components<'t, 'i>(&self, count: usize, tokens: &'t [Token<'i>]) -> Parsed<'t, 'i, Vec<Expression>> {
		let mut rest = tokens;
		let mut components = Vec::with_capacity(count);
		for _ in 0..count {
			let (component, tail) = self.expression(rest)?;
			components.push(component);
			rest = tail;
		}
		Ok((components, rest))
	}

	fn defined<'t, 'i>(&self, definition: &Arc<ExpressionDefinition>, tokens: &'t [Token<'i>]) -> Parsed<'t, 'i, Expression> {
		let mut rest = tokens;
		let mut bound_variables = Vec::with_capacity(definition.bound_variables);
		for _ in 0..definition.bound_variables {
			let (token, tail) = self.pop(rest, "a bound variable name")?;
			if token.is_bracket() {
				return Err(malformed(format!("expected a bound variable name, found `{}`", token.text), token.span()));
			}
			bound_variables.push(token.text.to_string());
			rest = tail;
		}

		let (mut components, rest) = self.components(definition.arity, rest)?;

		// в слитом выражении типа негде хранить имена связанных переменных
		if definition.has_attribute(CONJUNCTION) && bound_variables.is_empty() {
			components = match <[Expression; 2]>::try_from(components) {
				Ok([first, second]) => match fold_conjunction(definition, first, second) {
					Ok(folded) => return Ok((folded, rest)),
					Err((first, second)) => vec![first, second],
				},
				Err(components) => components,
			};
		}

		let expression = Expression::Defined {
			definition: definition.clone(),
			bound_variables,
			components,
		};
		Ok((expression, rest))
	}

	/// `with ( a b ... ) name`
	fn application<'t, 'i>(&self, tokens: &'t [Token<'i>]) -> Parsed<'t, 'i, Expression> {
		let (open, mut rest) = self.pop(tokens, "`(` after `with`")?;
		if open.text != "(" {
			return Err(malformed(format!("expected `(` after `with`, found `{}`", open.text), open.span()));
		}

		let mut arguments = Vec::new();
		loop {
			let (next, tail) = self.pop(rest, "`)` closing the argument list")?;
			if next.text == ")" {
				rest = tail;
				break;
			}
			let (argument, tail) = self.expression(rest)?;
			arguments.push(argument);
			rest = tail;
		}

		let (name, rest) = self.pop(rest, "a variable name after the argument list")?;
		if name.is_bracket() {
			return Err(malformed(format!("expected a variable name, found `{}`", name.text), name.span()));
		}

		let expression = Expression::Variable {
			name: name.text.to_string(),
			disambiguator: None,
			components: arguments,
		};
		Ok((expression, rest))
	}
}

/// `$0` ссылается на ближайшую область видимости, `$$0` на следующую за ней.
fn function_parameter(token: &Token<'_>) -> Result<Expression, Spanned<ParseError>> {
	let invalid = || Spanned::new(ParseError::InvalidParameter { token: token.text.to_string() }, token.span());

	let dollars = token.text.chars().take_while(|c| *c == '$').count();
	let digits = &token.text[dollars..];
	if dollars == 0 || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
		return Err(invalid());
	}
	let index = digits.parse::<usize>().map_err(|_| invalid())?;

	Ok(Expression::FunctionParameter {
		level: dollars - 1,
		index,
	})
}

/// Накопитель слияния конъюнкции. Владеет растущим состоянием выражения типа и превращается в неизменяемое `TypeExpression` только после того, как слияние закончено.
struct TypeAccumulator {
	definition: Arc<TypeDefinition>,
	term: Box<Expression>,
	term_text: String,
	explicit_qualifier: Option<Arc<TypeQualifierDefinition>>,
	qualifier_components: Vec<Expression>,
	qualifier_texts: Vec<String>,
	attachments: Vec<TypeAttachment>,
	conjunction: Option<Arc<ExpressionDefinition>>,
}

impl From<TypeExpression> for TypeAccumulator {
	fn from(expression: TypeExpression) -> Self {
		TypeAccumulator {
			term_text: expression.term.serialize(),
			qualifier_texts: expression.qualifier_components.iter().map(Expression::serialize).collect(),
			definition: expression.definition,
			term: expression.term,
			explicit_qualifier: expression.explicit_qualifier,
			qualifier_components: expression.qualifier_components,
			attachments: expression.attachments,
			conjunction: expression.conjunction,
		}
	}
}

impl TypeAccumulator {
	fn is_about_same_term(&self, parent: &TypeDefinition, term: &Expression) -> bool {
		parent.symbol == self.definition.symbol && term.serialize() == self.term_text
	}

	/// Компоненты квалификатора сравниваются по строковой форме, а не структурно.
	fn qualifier_matches(&self, required_qualifier: Option<&str>, components: &[Expression]) -> bool {
		let has_default = self.definition.default_qualifier.is_some();
		if !has_default && required_qualifier.is_none() {
			return true;
		}

		let explicit = self.explicit_qualifier.as_ref().map(|qualifier| qualifier.symbol.as_str());
		(required_qualifier == explicit || has_default)
			&& components.iter().map(Expression::serialize).eq(self.qualifier_texts.iter().cloned())
	}

	fn accepts_qualifier(&self, parent: &TypeDefinition, term: &Expression) -> bool {
		self.is_about_same_term(parent, term)
			&& self.definition.default_qualifier.is_none()
			&& self.explicit_qualifier.is_none()
			&& self.attachments.is_empty()
	}

	fn accepts_attachment(&self, parent: &TypeDefinition, term: &Expression, required_qualifier: Option<&str>, components: &[Expression]) -> bool {
		self.is_about_same_term(parent, term) && self.qualifier_matches(required_qualifier, components)
	}

	/// Попробовать слить `candidate`. Если не получилось, он возвращается обратно, а накопитель не меняется.
	fn absorb(&mut self, candidate: Expression, conjunction: &Arc<ExpressionDefinition>) -> Result<(), Expression> {
		if let Some(existing) = &self.conjunction {
			if existing.symbol != conjunction.symbol {
				return Err(candidate);
			}
		}

		match candidate {
			Expression::TypeQualifier { definition, parent, term, components } if self.accepts_qualifier(&parent, &term) => {
				self.qualifier_texts = components.iter().map(Expression::serialize).collect();
				self.qualifier_components = components;
				self.explicit_qualifier = Some(definition);
			},
			Expression::Property { definition, parent, term, components }
				if self.accepts_attachment(&parent, &term, definition.required_qualifier.as_deref(), &components) =>
			{
				self.attachments.push(TypeAttachment::Property(definition));
			},
			Expression::RelatedObject { definition, parent, term, parent_term, components }
				if self.accepts_attachment(&parent, &parent_term, definition.required_qualifier.as_deref(), &components) =>
			{
				self.attachments.push(TypeAttachment::RelatedObject {
					definition,
					term: *term,
				});
			},
			other => return Err(other),
		}

		self.conjunction = Some(conjunction.clone());
		Ok(())
	}

	fn finish(self) -> TypeExpression {
		TypeExpression {
			definition: self.definition,
			term: self.term,
			explicit_qualifier: self.explicit_qualifier,
			qualifier_components: self.qualifier_components,
			attachments: self.attachments,
			conjunction: self.conjunction,
		}
	}
}

/// Слить второй компонент конъюнкции в первый, если первый является выражением типа, а второй говорит о том же терме. Иначе компоненты возвращаются как были.
fn fold_conjunction(
	conjunction: &Arc<ExpressionDefinition>,
	first: Expression,
	second: Expression,
) -> Result<Expression, (Expression, Expression)> {
	let expression = match first {
		Expression::Type(expression) => expression,
		other => return Err((other, second)),
	};

	let mut accumulator = TypeAccumulator::from(expression);
	match accumulator.absorb(second, conjunction) {
		Ok(()) => {
			tracing::debug!(
				conjunction = %conjunction.symbol,
				term = %accumulator.term_text,
				attachments = accumulator.attachments.len(),
				"folded into type expression"
			);
			Ok(Expression::Type(accumulator.finish()))
		},
		Err(second) => {
			tracing::debug!(
				conjunction = %conjunction.symbol,
				candidate = %second,
				"not folded into type expression"
			);
			Err((Expression::Type(accumulator.finish()), second))
		},
	}
}
