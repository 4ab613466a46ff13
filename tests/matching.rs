mod common;

use common::*;
use proofedit::binding::{match_template, Formula, FormulaError, MatchResult};
use proofedit::expr::{EditError, Expression};
use proofedit::position::{TreePath, TreePathBuf};

fn binding(pattern_name: &str, expression: Expression, path: Vec<usize>, scopes: Vec<Vec<&str>>) -> MatchResult {
	MatchResult::Binding {
		pattern_name: pattern_name.to_string(),
		expression,
		path: TreePathBuf(path),
		bound_variable_scopes: scopes
			.into_iter()
			.map(|scope| scope.into_iter().map(String::from).collect())
			.collect(),
	}
}

#[test]
fn repeated_pattern_must_bind_same_expression() {
	let tables = tables();
	let template = expr(&tables, "f s0 s0");

	let results = match_template(&template, &expr(&tables, "f a a")).unwrap();
	assert_eq!(
		results,
		vec![
			binding("s0", Expression::variable("a"), vec![0], vec![]),
			binding("s0", Expression::variable("a"), vec![1], vec![]),
		]
	);

	assert_eq!(match_template(&template, &expr(&tables, "f a b")), None);
	assert!(match_template(&template, &expr(&tables, "f not a not a")).is_some());
}

#[test]
fn pattern_matches_anything() {
	let tables = tables();
	let expression = expr(&tables, "and Group x is-abelian x");
	let results = match_template(&Expression::variable("p"), &expression).unwrap();
	assert_eq!(results, vec![binding("p", expression, vec![], vec![])]);
}

#[test]
fn different_definitions_dont_match() {
	let tables = tables();
	assert_eq!(match_template(&expr(&tables, "not p"), &expr(&tables, "f a b")), None);
	assert_eq!(match_template(&expr(&tables, "Group g"), &expr(&tables, "Set g")), None);
	assert_eq!(match_template(&expr(&tables, "with (a) g"), &expr(&tables, "with (a) g")), None);
	assert_eq!(match_template(&expr(&tables, "is-prime p"), &expr(&tables, "is-prime q")), None);
}

#[test]
fn bound_variables() {
	let tables = tables();
	let template = expr(&tables, "forall x eq $0 p");

	let results = match_template(&template, &expr(&tables, "forall y eq $0 c")).unwrap();
	assert_eq!(
		results,
		vec![
			binding("p", Expression::variable("c"), vec![0, 1], vec![vec!["y"]]),
			MatchResult::BoundVariable {
				template_name: "x".to_string(),
				matched_name: "y".to_string(),
				index: 0,
				path: TreePathBuf::new(),
			},
		]
	);

	assert_eq!(match_template(&template, &expr(&tables, "forall y eq c $0")), None);
	assert_eq!(match_template(&template, &expr(&tables, "forall y eq $$0 c")), None);
	assert_eq!(match_template(&template, &expr(&tables, "exists y eq $0 c")), None);
}

#[test]
fn type_expressions() {
	let tables = tables();

	let results = match_template(&expr(&tables, "VectorSpace v k"), &expr(&tables, "VectorSpace V F")).unwrap();
	assert_eq!(
		results,
		vec![
			binding("v", Expression::variable("V"), vec![0], vec![]),
			binding("k", Expression::variable("F"), vec![1], vec![]),
		]
	);

	// пути ведут в развёрнутую конъюнкцию конкретного выражения
	let concrete = expr(&tables, "and VectorSpace V F normed V F");
	let results = match_template(&expr(&tables, "VectorSpace v k"), &concrete).unwrap();
	assert_eq!(
		results,
		vec![
			binding("v", Expression::variable("V"), vec![0, 0], vec![]),
			binding("k", Expression::variable("F"), vec![0, 1], vec![]),
		]
	);
	for result in &results {
		if let MatchResult::Binding { expression, path, .. } = result {
			assert_eq!(&concrete.subexpression(path).unwrap(), expression);
		}
	}

	assert_eq!(match_template(&expr(&tables, "VectorSpace v v"), &expr(&tables, "VectorSpace V F")), None);
}

#[test]
fn rewrite_rule() {
	let tables = tables();
	let formula = Formula::new(expr(&tables, "not not p"), expr(&tables, "p")).unwrap();

	let (result, paths) = formula.apply_at(&expr(&tables, "not not a"), TreePath::root()).unwrap().unwrap();
	assert_eq!(result, expr(&tables, "a"));
	assert_eq!(paths, vec![TreePathBuf::new()]);

	let expression = expr(&tables, "f b not not a");
	let (result, paths) = formula.apply_at(&expression, TreePath::from_slice(&[1])).unwrap().unwrap();
	assert_eq!(result, expr(&tables, "f b a"));
	assert_eq!(paths, vec![TreePathBuf(vec![1])]);

	assert_eq!(formula.apply_at(&expression, TreePath::from_slice(&[0])).unwrap(), None);
	assert_eq!(
		formula.apply_at(&expression, TreePath::from_slice(&[5])).unwrap_err(),
		EditError::PathOutOfRange { depth: 0, index: 5 }
	);

	let reversed = formula.reversed().unwrap();
	let (result, _) = reversed.apply_at(&expr(&tables, "a"), TreePath::root()).unwrap().unwrap();
	assert_eq!(result, expr(&tables, "not not a"));
}

#[test]
fn rewrite_keeps_bound_variable_names() {
	let tables = tables();
	let formula = Formula::new(expr(&tables, "not forall x p"), expr(&tables, "exists x not p")).unwrap();
	let (result, _) = formula
		.apply_at(&expr(&tables, "not forall y eq $0 c"), TreePath::root())
		.unwrap()
		.unwrap();
	assert_eq!(result.serialize(), "exists y not eq $0 c");
}

#[test]
fn rewrite_shifts_references_to_outer_binders() {
	let tables = tables();
	let formula = Formula::new(expr(&tables, "and forall x p q"), expr(&tables, "forall x and p q")).unwrap();
	let expression = expr(&tables, "forall z and forall y eq $0 c eq $0 c");
	let (result, paths) = formula.apply_at(&expression, TreePath::from_slice(&[0])).unwrap().unwrap();
	assert_eq!(result.serialize(), "forall z forall y and eq $0 c eq $$0 c");
	assert_eq!(paths, vec![TreePathBuf(vec![0])]);

	// обратно: `q` выходит из-под квантора и ссылка снова указывает на `z`
	let (back, _) = formula.reversed().unwrap().apply_at(&result, TreePath::from_slice(&[0])).unwrap().unwrap();
	assert_eq!(back, expression);
}

#[test]
fn rewrite_cant_drop_a_used_binder() {
	let tables = tables();
	let formula = Formula::new(expr(&tables, "forall x p"), expr(&tables, "p")).unwrap();

	let (result, _) = formula.apply_at(&expr(&tables, "forall y eq c d"), TreePath::root()).unwrap().unwrap();
	assert_eq!(result, expr(&tables, "eq c d"));

	let (result, _) = formula
		.apply_at(&expr(&tables, "forall z forall y eq $$0 c"), TreePath::from_slice(&[0]))
		.unwrap()
		.unwrap();
	assert_eq!(result.serialize(), "forall z eq $0 c");

	assert_eq!(
		formula.apply_at(&expr(&tables, "forall y eq $0 c"), TreePath::root()).unwrap_err(),
		EditError::EscapingParameter { pattern_name: "p".to_string() }
	);
}

#[test]
fn rewrite_inside_type_fans_out() {
	let tables = tables();
	let formula = Formula::new(expr(&tables, "f a b"), expr(&tables, "f b a")).unwrap();
	let expression = expr(&tables, "and Group f x y is-abelian f x y");
	let (result, paths) = formula.apply_at(&expression, TreePath::from_slice(&[1, 0])).unwrap().unwrap();
	assert_eq!(result.serialize(), "and Group f y x is-abelian f y x");
	assert_eq!(paths, vec![TreePathBuf(vec![0, 0]), TreePathBuf(vec![1, 0])]);
}

#[test]
fn right_side_must_not_introduce_patterns() {
	let tables = tables();
	let error = Formula::new(expr(&tables, "not p"), expr(&tables, "f p q")).unwrap_err();
	assert_eq!(error, FormulaError::UnboundPatterns { names: vec!["q".to_string()] });
}
