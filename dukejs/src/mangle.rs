//! Turning java names into javascript identifiers.
//!
//! The escapes follow the ones used for JNI symbols: `_1` for `_`, `_2` for `;`, `_3` for `[` and `_0xxxx` for any other
//! character outside of `[A-Za-z0-9$]`.
//!
//! Like with JNI symbols, the result isn't always unique:
//! - a name segment starting with a digit can look like an escape, `a/000e4` and `a\u{e4}` are both `a_000e4`
//! - method names are followed by the types without a separator, `int aI()` and `int a(int)` are both `aII`
//! - static methods share the global scope with classes, the method `c()V` of `a/b` and the class `a/b/cV` are both
//!   `a_b_cV`
//!
//! Classes that run into this need to be renamed before translating them.

use anyhow::Result;
use duke::tree::descriptor::{MethodDescriptor, Type};
use duke::tree::method::Method;

fn escape_into(out: &mut String, name: &str, separator: char) {
	for char in name.chars() {
		match char {
			'a'..='z' | 'A'..='Z' | '0'..='9' | '$' => out.push(char),
			'/' => out.push(separator),
			'_' => out.push_str("_1"),
			';' => out.push_str("_2"),
			'[' => out.push_str("_3"),
			_ => {
				let mut units = [0u16; 2];
				for unit in char.encode_utf16(&mut units) {
					out.push_str(&format!("_0{unit:04x}"));
				}
			},
		}
	}
}

/// The name of the constructor function of a class, `a/b/C` becomes `a_b_C`.
pub fn class_name(class: &str) -> String {
	let mut out = String::with_capacity(class.len());
	escape_into(&mut out, class, '_');
	out
}

fn type_into(out: &mut String, t: &Type) {
	match t {
		Type::Object(class) => {
			out.push('L');
			escape_into(out, class.as_str(), '_');
		},
		Type::Array(inner) => {
			out.push_str("_3");
			type_into(out, inner);
		},
		primitive => out.push_str(&primitive.to_string()),
	}
}

/// The name of a method, made up of the name, the return type and the parameter types.
///
/// ```
/// # fn main() -> anyhow::Result<()> {
/// assert_eq!(dukejs::mangle::method_name("sum", "(II)I")?, "sumIII");
/// assert_eq!(dukejs::mangle::method_name("none", "(II)Ljava/lang/Object;")?, "noneLjava_lang_ObjectII");
/// assert_eq!(dukejs::mangle::method_name("<init>", "()V")?, "consV");
/// # Ok(())
/// # }
/// ```
pub fn method_name(name: &str, descriptor: &str) -> Result<String> {
	let descriptor = MethodDescriptor::parse(descriptor)?;

	let mut out = String::new();
	match name {
		Method::INIT => out.push_str("cons"),
		Method::CLINIT => out.push_str("clinit"),
		name => escape_into(&mut out, name, '_'),
	}
	match &descriptor.return_type {
		Some(t) => type_into(&mut out, t),
		None => out.push('V'),
	}
	for parameter in &descriptor.parameters {
		type_into(&mut out, parameter);
	}
	Ok(out)
}

/// The global function a static method is stored in.
pub fn static_method(class: &str, name: &str, descriptor: &str) -> Result<String> {
	Ok(format!("{}_{}", class_name(class), method_name(name, descriptor)?))
}

/// The property name of a field, without any suffix for shadowed fields.
pub fn field_name(name: &str) -> String {
	let mut out = String::from("fld_");
	escape_into(&mut out, name, '_');
	out
}
