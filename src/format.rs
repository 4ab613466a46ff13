/// Кусок строки отображения: либо текст как есть, либо `{имя}`, вместо которого подставляется часть выражения.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Segment<'a> {
	Text(&'a str),
	Placeholder(&'a str),
}

peg::parser!(
	grammar display_format() for str {
		pub rule segments() -> Vec<Segment<'input>>
			= s:segment()* { s }

		rule segment() -> Segment<'input>
			= "{" name:$((!['{' | '}'] [_])+) "}" { Segment::Placeholder(name) }
			/ text:$((!['{'] [_])+) { Segment::Text(text) }
			/ text:$("{") { Segment::Text(text) }
	}
);

/// Разбить строку отображения на куски. Любая строка разбирается: непарная `{` считается текстом.
pub fn segments(format: &str) -> Vec<Segment<'_>> {
	display_format::segments(format).unwrap_or_else(|_| vec![Segment::Text(format)])
}

/// Подставить значения вместо `{имя}`. Если `lookup` не знает имени, подстановка остаётся в тексте как есть.
pub fn render<F>(format: &str, mut lookup: F) -> String
where
	F: FnMut(&str) -> Option<String>,
{
	let mut result = String::with_capacity(format.len());
	for segment in segments(format) {
		match segment {
			Segment::Text(text) => result.push_str(text),
			Segment::Placeholder(name) => match lookup(name) {
				Some(value) => result.push_str(&value),
				None => {
					result.push('{');
					result.push_str(name);
					result.push('}');
				},
			},
		}
	}
	result
}
