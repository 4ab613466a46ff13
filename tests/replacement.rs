mod common;

use common::*;
use proofedit::expr::{EditError, Expression, ExpressionKind};
use proofedit::position::{TreePath, TreePathBuf};
use rstest::rstest;

fn paths(paths: &[&[usize]]) -> Vec<TreePathBuf> {
	paths.iter().map(|path| TreePathBuf(path.to_vec())).collect()
}

#[rstest]
#[case("f a b", &[1], "not c", "f a not c", &[&[1][..]])]
#[case("f a b", &[], "c", "c", &[&[][..]])]
#[case("forall x eq $0 c", &[0, 1], "d", "forall x eq $0 d", &[&[0, 1][..]])]
#[case("with (a b) g", &[0], "c", "with (c b) g", &[&[0][..]])]
#[case("subset-of S U", &[1], "V", "subset-of S V", &[&[1][..]])]
#[case("subset-of S U", &[0], "T", "subset-of T U", &[&[0][..]])]
#[case("VectorSpace V F", &[1], "K", "VectorSpace V K", &[&[1][..]])]
#[case("and Group x is-abelian x", &[0, 0], "y", "and Group y is-abelian y", &[&[0, 0][..], &[1, 0][..]])]
#[case("and Group x is-abelian x", &[1, 0], "y", "and Group y is-abelian y", &[&[0, 0][..], &[1, 0][..]])]
#[case("and Group g identity e g", &[0, 0], "h", "and Group h identity e h", &[&[0, 0][..], &[1, 1][..]])]
#[case("and Group g identity e g", &[1, 0], "u", "and Group g identity u g", &[&[1, 0][..]])]
#[case(
	"and and VectorSpace V F finite-dimensional V F normed V F",
	&[0, 0, 1],
	"K",
	"and and VectorSpace V K finite-dimensional V K normed V K",
	&[&[0, 0, 1][..], &[0, 1, 1][..], &[1, 1][..]]
)]
#[case(
	"and and VectorSpace V F finite-dimensional V F normed V F",
	&[1, 1],
	"K",
	"and and VectorSpace V K finite-dimensional V K normed V K",
	&[&[0, 0, 1][..], &[0, 1, 1][..], &[1, 1][..]]
)]
#[case(
	"and and Set S subset-of S U is-countable S U",
	&[0, 1, 0],
	"T",
	"and and Set T subset-of T U is-countable T U",
	&[&[0, 0, 0][..], &[0, 1, 0][..], &[1, 0][..]]
)]
#[case(
	"and and Set S subset-of S U is-countable S U",
	&[0, 1, 1],
	"W",
	"and and Set S subset-of S W is-countable S W",
	&[&[0, 1, 1][..], &[1, 1][..]]
)]
#[case(
	"and and Set S subset-of S U is-empty S",
	&[0, 1, 1],
	"W",
	"and and Set S subset-of S W is-empty S",
	&[&[0, 1, 1][..]]
)]
#[case(
	"and Group f a b is-abelian f a b",
	&[0, 0, 1],
	"c",
	"and Group f a c is-abelian f a c",
	&[&[0, 0, 1][..], &[1, 0, 1][..]]
)]
fn replace(
	#[case] input: &str,
	#[case] path: &[usize],
	#[case] replacement: &str,
	#[case] expected: &str,
	#[case] expected_paths: &[&[usize]],
) {
	let tables = tables();
	let expression = expr(&tables, input);
	let replacement = expr(&tables, replacement);

	let (result, result_paths) = expression.replace_at_path(TreePath::from_slice(path), replacement.clone()).unwrap();
	assert_eq!(result.serialize(), expected);
	assert_eq!(result_paths, paths(expected_paths));

	for path in &result_paths {
		assert_eq!(result.subexpression(path).unwrap(), replacement);
	}
}

#[test]
fn qualifier_fan_out_keeps_type_folded() {
	let tables = tables();
	let expression = expr(&tables, "and and VectorSpace V F finite-dimensional V F normed V F");
	let (result, result_paths) = expression
		.replace_at_path(TreePath::from_slice(&[0, 0, 1]), Expression::variable("K"))
		.unwrap();
	assert_eq!(result.kind(), ExpressionKind::Type);
	assert_eq!(result_paths.len(), 3);
	assert_eq!(result, expr(&tables, "and and VectorSpace V K finite-dimensional V K normed V K"));
}

#[rstest]
#[case("is-abelian x", &[0], EditError::UnsupportedReplacement { kind: ExpressionKind::Property })]
#[case("identity e g", &[1], EditError::UnsupportedReplacement { kind: ExpressionKind::RelatedObject })]
#[case("is-subgroup-of H G", &[0], EditError::UnsupportedReplacement { kind: ExpressionKind::TypeRelation })]
#[case("is-prime p", &[0], EditError::UnsupportedReplacement { kind: ExpressionKind::StandaloneProperty })]
#[case("and Group x is-abelian x", &[0], EditError::UnsupportedReplacement { kind: ExpressionKind::Type })]
#[case("and Group x is-abelian x", &[1], EditError::UnsupportedReplacement { kind: ExpressionKind::Type })]
#[case("and Group x is-abelian x", &[2], EditError::PathOutOfRange { depth: 0, index: 2 })]
#[case("and Group x is-abelian x", &[1, 1], EditError::PathOutOfRange { depth: 1, index: 1 })]
#[case("f a b", &[2], EditError::PathOutOfRange { depth: 0, index: 2 })]
#[case("f a b", &[0, 0], EditError::PathOutOfRange { depth: 1, index: 0 })]
#[case("subset-of S U", &[2], EditError::PathOutOfRange { depth: 0, index: 2 })]
#[case("not $0", &[0, 0], EditError::UnsupportedReplacement { kind: ExpressionKind::FunctionParameter })]
fn replace_errors(#[case] input: &str, #[case] path: &[usize], #[case] expected: EditError) {
	let tables = tables();
	let expression = expr(&tables, input);
	let error = expression
		.replace_at_path(TreePath::from_slice(path), Expression::variable("z"))
		.unwrap_err();
	assert_eq!(error, expected);
}

#[test]
fn subexpression_reads_inside_every_node() {
	let tables = tables();
	let expression = expr(&tables, "f a not c");
	assert_eq!(expression.subexpression(TreePath::from_slice(&[1, 0])).unwrap(), Expression::variable("c"));
	assert_eq!(
		expression.subexpression(TreePath::from_slice(&[2])).unwrap_err(),
		EditError::PathOutOfRange { depth: 0, index: 2 }
	);

	let property = expr(&tables, "is-abelian x");
	assert_eq!(property.subexpression(TreePath::from_slice(&[0])).unwrap(), Expression::variable("x"));

	let folded = expr(&tables, "and Group x is-abelian x");
	assert_eq!(folded.subexpression(TreePath::from_slice(&[1])).unwrap(), expr(&tables, "is-abelian x"));
	assert_eq!(folded.subexpression(TreePath::from_slice(&[0])).unwrap(), expr(&tables, "Group x"));
}

#[test]
fn rename_bound_variable() {
	let tables = tables();
	let expression = expr(&tables, "not forall x eq $0 c");

	let renamed = expression.rename_bound_variable("y", 0, TreePath::from_slice(&[0])).unwrap();
	assert_eq!(renamed.serialize(), "not forall y eq $0 c");

	assert_eq!(
		expression.rename_bound_variable("y", 0, TreePath::root()).unwrap_err(),
		EditError::UnsupportedBoundVariableRename { kind: ExpressionKind::Defined }
	);
	assert_eq!(
		expression.rename_bound_variable("y", 1, TreePath::from_slice(&[0])).unwrap_err(),
		EditError::PathOutOfRange { depth: 1, index: 1 }
	);
	assert_eq!(
		expr(&tables, "is-abelian x").rename_bound_variable("y", 0, TreePath::from_slice(&[0])).unwrap_err(),
		EditError::UnsupportedReplacement { kind: ExpressionKind::Property }
	);
}

#[test]
fn unfold_is_identity_for_plain_nodes() {
	let tables = tables();
	let plain = expr(&tables, "f a b");
	assert_eq!(plain.unfold(), plain);

	let folded = expr(&tables, "and Group x is-abelian x");
	let unfolded = folded.unfold();
	assert_eq!(unfolded.kind(), ExpressionKind::Defined);
	assert_eq!(unfolded.serialize(), folded.serialize());
}

#[test]
fn bind_free_variables() {
	let tables = tables();
	let expression = expr(&tables, "f x exists y eq x $0");
	let bound = expression.bind_free_variables(&["x".to_string()]);
	assert_eq!(bound.serialize(), "f $0 exists y eq $$0 $0");
}
