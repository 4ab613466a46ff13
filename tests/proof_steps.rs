mod common;

use common::*;
use proofedit::definitions::SymbolTables;
use proofedit::expr::Expression;
use proofedit::position::{TreePath, TreePathBuf};
use proofedit::proof::*;

fn step(name: &str) -> ProofStep {
	ProofStep::assertion(Expression::variable(name))
}

fn steps(names: &[&str]) -> Vec<ProofStep> {
	insert_steps(TreePath::from_slice(&[0]), &[], names.iter().map(|name| step(name)).collect()).unwrap()
}

fn names(steps: &[ProofStep]) -> Vec<String> {
	steps
		.iter()
		.map(|step| match &step.kind {
			StepKind::Assertion { statement } => statement.serialize(),
			StepKind::Deduction { assumption, .. } => format!("assume {}", assumption),
			StepKind::Generalization { variables, .. } => format!("for all {}", variables.join(" ")),
		})
		.collect()
}

/// У каждого шага путь совпадает с его положением.
fn assert_paths_match_positions(steps: &[ProofStep], parent: &TreePath) {
	for (index, step) in steps.iter().enumerate() {
		assert_eq!(step.path, parent.child(index));
		if let Some(substeps) = step.substeps() {
			assert_paths_match_positions(substeps, &step.path);
		}
	}
}

fn nested() -> Vec<ProofStep> {
	let deduction = ProofStep::deduction(Expression::variable("p"), vec![step("b"), step("c")]);
	let mut result = steps(&["a", "d"]);
	result = insert_steps(TreePath::from_slice(&[1]), &result, vec![deduction]).unwrap();
	result
}

#[test]
fn insert_reindexes_following_steps() {
	let initial = steps(&["a", "b", "c"]);
	assert_paths_match_positions(&initial, TreePath::root());

	let result = insert_steps(TreePath::from_slice(&[1]), &initial, vec![step("x"), step("y")]).unwrap();
	assert_eq!(result.len(), 5);
	assert_eq!(names(&result), vec!["a", "x", "y", "b", "c"]);
	assert_eq!(result[3].path, TreePathBuf(vec![3]));
	assert_paths_match_positions(&result, TreePath::root());
}

#[test]
fn insert_at_end_appends() {
	let initial = steps(&["a", "b", "c"]);
	let result = insert_steps(TreePath::from_slice(&[3]), &initial, vec![step("d")]).unwrap();
	assert_eq!(names(&result), vec!["a", "b", "c", "d"]);

	assert_eq!(
		insert_steps(TreePath::from_slice(&[5]), &initial, vec![step("d")]).unwrap_err(),
		StepError::PathOutOfRange { depth: 0, index: 5 }
	);
	assert_eq!(insert_steps(TreePath::root(), &initial, vec![]).unwrap_err(), StepError::EmptyPath);
}

#[test]
fn insert_into_substeps() {
	let initial = nested();
	assert_paths_match_positions(&initial, TreePath::root());

	let result = insert_steps(TreePath::from_slice(&[1, 1]), &initial, vec![step("x")]).unwrap();
	let substeps = result[1].substeps().unwrap();
	assert_eq!(names(substeps), vec!["b", "x", "c"]);
	assert_eq!(substeps[2].path, TreePathBuf(vec![1, 2]));
	assert_paths_match_positions(&result, TreePath::root());

	assert_eq!(
		insert_steps(TreePath::from_slice(&[0, 0]), &initial, vec![step("x")]).unwrap_err(),
		StepError::NoSubsteps { depth: 1 }
	);
	assert_eq!(
		insert_steps(TreePath::from_slice(&[7, 0]), &initial, vec![step("x")]).unwrap_err(),
		StepError::PathOutOfRange { depth: 0, index: 7 }
	);
}

#[test]
fn replace_splices_any_number_of_steps() {
	let initial = steps(&["a", "b", "c"]);

	let removed = replace_step(TreePath::from_slice(&[1]), &initial, vec![]).unwrap();
	assert_eq!(names(&removed), vec!["a", "c"]);
	assert_paths_match_positions(&removed, TreePath::root());

	let expanded = replace_step(TreePath::from_slice(&[0]), &initial, vec![step("x"), step("y")]).unwrap();
	assert_eq!(names(&expanded), vec!["x", "y", "b", "c"]);
	assert_paths_match_positions(&expanded, TreePath::root());

	assert_eq!(
		replace_step(TreePath::from_slice(&[3]), &initial, vec![]).unwrap_err(),
		StepError::PathOutOfRange { depth: 0, index: 3 }
	);
}

#[test]
fn update_nested_step() {
	let initial = nested();
	let result = update_step(TreePath::from_slice(&[1, 0]), &initial, step("z")).unwrap();
	assert_eq!(names(result[1].substeps().unwrap()), vec!["z", "c"]);
	assert_eq!(result[1].substeps().unwrap()[0].path, TreePathBuf(vec![1, 0]));
	assert_eq!(names(&result), names(&initial));

	assert_eq!(
		update_step(TreePath::from_slice(&[1, 2]), &initial, step("z")).unwrap_err(),
		StepError::PathOutOfRange { depth: 1, index: 2 }
	);
	assert_eq!(update_step(TreePath::root(), &initial, step("z")).unwrap_err(), StepError::EmptyPath);
}

#[test]
fn replace_range() {
	let initial = steps(&["a", "b", "c"]);

	let result = replace_step_range(TreePath::from_slice(&[0]), 2, &initial, vec![step("z")]).unwrap();
	assert_eq!(names(&result), vec!["z", "c"]);
	assert_paths_match_positions(&result, TreePath::root());

	let result = replace_step_range(TreePath::from_slice(&[1]), 1, &initial, vec![step("z")]).unwrap();
	assert_eq!(names(&result), vec!["a", "z", "b", "c"]);

	assert_eq!(
		replace_step_range(TreePath::from_slice(&[2]), 1, &initial, vec![]).unwrap_err(),
		StepError::InvalidRange { start: 2, end: 1, len: 3 }
	);
	assert_eq!(
		replace_step_range(TreePath::from_slice(&[0]), 4, &initial, vec![]).unwrap_err(),
		StepError::InvalidRange { start: 0, end: 4, len: 3 }
	);
}

#[test]
fn proven_statements() {
	let tables = tables();

	let deduction = ProofStep::deduction(expr(&tables, "p"), vec![step("b"), ProofStep::assertion(expr(&tables, "not c"))]);
	assert_eq!(deduction.proven_statement(&tables), Some(expr(&tables, "implies p not c")));

	let generalization = ProofStep::generalization(vec!["x".to_string()], vec![ProofStep::assertion(expr(&tables, "eq x c"))]);
	assert_eq!(generalization.proven_statement(&tables), Some(expr(&tables, "forall x eq $0 c")));

	let nested = ProofStep::generalization(vec!["x".to_string()], vec![deduction.clone()]);
	assert_eq!(nested.proven_statement(&tables), Some(expr(&tables, "forall x implies p not c")));

	let empty = ProofStep::deduction(expr(&tables, "p"), vec![]);
	assert_eq!(empty.proven_statement(&tables), None);

	assert_eq!(deduction.proven_statement(&SymbolTables::default()), None);

	let two_variables = ProofStep::generalization(vec!["x".to_string(), "y".to_string()], vec![step("b")]);
	assert_eq!(two_variables.proven_statement(&tables), None);
}
