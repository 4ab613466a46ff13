use annotate_snippets::{
	display_list::{DisplayList, FormatOptions},
	snippet::{Annotation, AnnotationType, Slice, Snippet, SourceAnnotation},
};
use std::fmt::{self, Display};
use std::ops::Range;

/// Байтовый диапазон во входной строке.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct GlobalSpan(pub Range<usize>);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Spanned<T> {
	pub span: GlobalSpan,
	pub inner: T,
}

impl<T> Spanned<T> {
	pub fn new(t: T, span: GlobalSpan) -> Self {
		Spanned {
			span,
			inner: t,
		}
	}
}

impl<T: Display> Display for Spanned<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} at {}..{}", self.inner, self.span.0.start, self.span.0.end)
	}
}

impl<T: fmt::Debug + Display> std::error::Error for Spanned<T> {}

fn char_position(string: &str, byte_pos: usize) -> usize {
	string
		.char_indices()
		.take_while(|(index, _)| *index < byte_pos)
		.count()
}

/// Диапазон символов для подсветки. Пустой диапазон (конец ввода) подсвечивает последний символ, чтобы подсветка была видна.
fn annotation_range(string: &str, span: &GlobalSpan) -> (usize, usize) {
	let start = char_position(string, span.0.start);
	let end = char_position(string, span.0.end);
	if start < end {
		(start, end)
	} else {
		let total = string.chars().count();
		if start >= total {
			(total.saturating_sub(1), total)
		} else {
			(start, start + 1)
		}
	}
}

impl<T: Display> Spanned<T> {
	/// Ошибка в виде фрагмента исходника с подсвеченным местом.
	pub fn render_snippet(&self, string: &str, color: bool) -> String {
		let text = self.inner.to_string();
		let slices = if string.trim().is_empty() {
			vec![]
		} else {
			vec![
				Slice {
					source: string,
					line_start: 1,
					origin: None,
					fold: false,
					annotations: vec![
						SourceAnnotation {
							label: "",
							annotation_type: AnnotationType::Error,
							range: annotation_range(string, &self.span),
						},
					],
				},
			]
		};
		let snippet = Snippet {
			title: Some(Annotation {
				label: Some(&text),
				id: None,
				annotation_type: AnnotationType::Error,
			}),
			footer: vec![],
			slices,
			opt: FormatOptions {
				color,
				..Default::default()
			},
		};
		DisplayList::from(snippet).to_string()
	}
}
