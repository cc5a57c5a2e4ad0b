use std::fmt::Write;
use java_string::JavaStr;

/// Collects lines of javascript, indented with tabs.
#[derive(Debug, Default)]
pub(crate) struct Js {
	out: String,
	depth: usize,
}

impl Js {
	pub(crate) fn new() -> Js {
		Js::default()
	}

	pub(crate) fn line(&mut self, line: impl AsRef<str>) {
		for _ in 0..self.depth {
			self.out.push('\t');
		}
		self.out.push_str(line.as_ref());
		self.out.push('\n');
	}

	/// Writes the line, and indents everything after it.
	pub(crate) fn open(&mut self, line: impl AsRef<str>) {
		self.line(line);
		self.depth += 1;
	}

	/// Stops indenting, and then writes the line.
	pub(crate) fn close(&mut self, line: impl AsRef<str>) {
		self.depth = self.depth.saturating_sub(1);
		self.line(line);
	}

	/// Both [`Js::close`] and [`Js::open`], for things like `} else {`.
	pub(crate) fn reopen(&mut self, line: impl AsRef<str>) {
		self.close(line);
		self.depth += 1;
	}

	/// Writes the text without indenting it, ending it with a newline if it doesn't already.
	pub(crate) fn raw(&mut self, text: &str) {
		self.out.push_str(text);
		if !text.ends_with('\n') {
			self.out.push('\n');
		}
	}

	pub(crate) fn finish(self) -> String {
		self.out
	}
}

/// Quotes a java string, escaping everything outside of printable ascii by its utf16 code units.
///
/// Unpaired surrogates survive this, as javascript strings are utf16 too.
pub(crate) fn string_literal(string: &JavaStr) -> String {
	let mut out = String::with_capacity(string.len() + 2);
	out.push('"');
	for char in string.chars() {
		match char.as_u32() {
			0x22 => out.push_str("\\\""),
			0x5c => out.push_str("\\\\"),
			0x0a => out.push_str("\\n"),
			0x0d => out.push_str("\\r"),
			0x09 => out.push_str("\\t"),
			x @ 0x20..=0x7e => out.push(char::from(x as u8)),
			x @ 0x10000.. => {
				let x = x - 0x10000;
				let _ = write!(out, "\\u{:04x}\\u{:04x}", 0xd800 + (x >> 10), 0xdc00 + (x & 0x3ff));
			},
			x => {
				let _ = write!(out, "\\u{x:04x}");
			},
		}
	}
	out.push('"');
	out
}

pub(crate) fn double_literal(value: f64) -> String {
	if value.is_nan() {
		"NaN".to_owned()
	} else if value.is_infinite() {
		if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
	} else if value == 0.0 && value.is_sign_negative() {
		"-0".to_owned()
	} else {
		value.to_string()
	}
}

/// Every `f32` is exactly representable as a double, so this needs no rounding at run time.
pub(crate) fn float_literal(value: f32) -> String {
	double_literal(f64::from(value))
}

pub(crate) fn long_literal(value: i64) -> String {
	format!("{value}n")
}

#[cfg(test)]
mod testing {
	use java_string::{JavaStr, JavaString};
	use pretty_assertions::assert_eq;
	use crate::js::{double_literal, float_literal, string_literal, Js};

	#[test]
	fn strings() {
		assert_eq!(string_literal(JavaStr::from_str("a\"b\\c\n")), r#""a\"b\\c\n""#);
		assert_eq!(string_literal(JavaStr::from_str("\u{e4}\u{1f600}")), r#""\u00e4\ud83d\ude00""#);

		// modified utf8 of a lone high surrogate
		let lone = JavaString::from_modified_utf8(vec![0xed, 0xa0, 0x80]).unwrap();
		assert_eq!(string_literal(&lone), r#""\ud800""#);
	}

	#[test]
	fn numbers() {
		assert_eq!(double_literal(f64::NAN), "NaN");
		assert_eq!(double_literal(f64::NEG_INFINITY), "-Infinity");
		assert_eq!(double_literal(-0.0), "-0");
		assert_eq!(double_literal(2.5), "2.5");
		assert_eq!(double_literal(3.0), "3");
		assert_eq!(float_literal(0.5), "0.5");
		assert_eq!(float_literal(0.1), "0.10000000149011612");
	}

	#[test]
	fn indentation() {
		let mut js = Js::new();
		js.open("if (a) {");
		js.line("b();");
		js.reopen("} else {");
		js.line("c();");
		js.close("}");
		assert_eq!(js.finish(), "if (a) {\n\tb();\n} else {\n\tc();\n}\n");
	}
}
