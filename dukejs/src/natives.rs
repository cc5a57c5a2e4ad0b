use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use duke::tree::annotation::AnnotationValue;
use duke::tree::method::Method;

/// The annotations that carry a javascript body for a method, as `JavaScriptBody(args = {..}, body = "..")`.
pub const JAVA_SCRIPT_BODY: [&str; 2] = [
	"Lorg/apidesign/bck2brwsr/core/JavaScriptBody;",
	"Lnet/java/html/js/JavaScriptBody;",
];

/// A javascript implementation of a method. The body is copied into the output as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBody {
	/// The names of the parameters of the javascript function.
	pub args: Vec<String>,
	pub body: String,
}

/// Javascript bodies for methods, by class, method name and descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeBodies {
	/// Keyed by `class.namedescriptor`, a class name never contains a `.` and a method name never contains a `(`.
	bodies: IndexMap<String, NativeBody>,
}

fn key(class: &str, method: &str, descriptor: &str) -> String {
	format!("{class}.{method}{descriptor}")
}

impl NativeBodies {
	pub fn new() -> NativeBodies {
		NativeBodies::default()
	}

	pub fn insert(&mut self, class: &str, method: &str, descriptor: &str, body: NativeBody) {
		self.bodies.insert(key(class, method, descriptor), body);
	}

	pub fn get(&self, class: &str, method: &str, descriptor: &str) -> Option<&NativeBody> {
		self.bodies.get(&key(class, method, descriptor))
	}

	pub fn len(&self) -> usize {
		self.bodies.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bodies.is_empty()
	}
}

/// Finds the javascript body of a method, looking in the table first, and then for a `JavaScriptBody` annotation.
pub(crate) fn find(natives: &NativeBodies, class: &str, method: &Method) -> Result<Option<NativeBody>> {
	if let Some(body) = natives.get(class, &method.name, &method.descriptor) {
		return Ok(Some(body.clone()));
	}

	let Some(annotation) = JAVA_SCRIPT_BODY.iter().find_map(|x| method.annotation(x)) else {
		return Ok(None);
	};

	let args = match annotation.get("args") {
		None => Vec::new(),
		Some(args) => args.as_array()
			.with_context(|| anyhow!("`args` of {} must be an array", annotation.type_descriptor))?
			.iter()
			.map(string_of)
			.collect::<Result<_>>()?,
	};
	let body = annotation.get("body")
		.with_context(|| anyhow!("{} is missing `body`", annotation.type_descriptor))
		.and_then(string_of)?;

	Ok(Some(NativeBody { args, body }))
}

fn string_of(value: &AnnotationValue) -> Result<String> {
	value.as_string()
		.with_context(|| anyhow!("expected a string, got {value:?}"))?
		.as_str()
		.map(|x| x.to_owned())
		.map_err(|_| anyhow!("javascript must be valid unicode, got {value:?}"))
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use raw_class_file::{flags, Annotation, ClassFile, ElementValue, ElementValuePairsEntry};
	use crate::natives::{find, NativeBodies, NativeBody};

	fn with_annotation(type_descriptor: &str, body: Option<&str>) -> Result<duke::tree::class::ClassFile> {
		let mut class = ClassFile::new("A", Some("java/lang/Object"));
		let type_index = class.pool.utf8(type_descriptor);
		let args_name = class.pool.utf8("args");
		let x = class.pool.utf8("x");
		let mut element_value_pairs = vec![
			ElementValuePairsEntry {
				element_name_index: args_name,
				value: ElementValue::Array { values: vec![ElementValue::String { const_value_index: x }] },
			},
		];
		if let Some(body) = body {
			element_value_pairs.push(ElementValuePairsEntry {
				element_name_index: class.pool.utf8("body"),
				value: ElementValue::String { const_value_index: class.pool.utf8(body) },
			});
		}
		let attribute = class.annotations(true, vec![Annotation { type_index, element_value_pairs }]);
		class.method(flags::ACC_STATIC | flags::ACC_NATIVE, "twice", "(I)I", vec![attribute]);
		duke::parse(&class.to_bytes())
	}

	#[test]
	fn from_annotation() -> Result<()> {
		let class = with_annotation("Lorg/apidesign/bck2brwsr/core/JavaScriptBody;", Some("return x * 2;"))?;
		let method = &class.methods[0];

		assert_eq!(find(&NativeBodies::new(), "A", method)?, Some(NativeBody {
			args: vec!["x".to_owned()],
			body: "return x * 2;".to_owned(),
		}));
		Ok(())
	}

	#[test]
	fn table_wins() -> Result<()> {
		let class = with_annotation("Lnet/java/html/js/JavaScriptBody;", Some("return x * 2;"))?;
		let method = &class.methods[0];

		let mut natives = NativeBodies::new();
		let body = NativeBody { args: vec!["y".to_owned()], body: "return y + y;".to_owned() };
		natives.insert("A", "twice", "(I)I", body.clone());

		assert_eq!(find(&natives, "A", method)?, Some(body));
		assert_eq!(find(&natives, "B", method)?.map(|x| x.args), Some(vec!["x".to_owned()]));
		Ok(())
	}

	#[test]
	fn lookup() {
		let mut natives = NativeBodies::new();
		let body = |x: &str| NativeBody { args: vec![], body: x.to_owned() };
		natives.insert("a/B", "m", "()V", body("one"));
		natives.insert("a/B", "m", "(I)V", body("two"));
		natives.insert("a/C", "m", "()V", body("three"));
		natives.insert("a/B", "m", "()V", body("four"));

		assert_eq!(natives.len(), 3);
		assert_eq!(natives.get("a/B", "m", "()V"), Some(&body("four")));
		assert_eq!(natives.get("a/B", "m", "(I)V"), Some(&body("two")));
		assert_eq!(natives.get("a/C", "m", "()V"), Some(&body("three")));
		assert_eq!(natives.get("a/C", "m", "(I)V"), None);
		assert_eq!(natives.get("a/B", "n", "()V"), None);
	}

	#[test]
	fn other_annotations_are_no_body() -> Result<()> {
		let class = with_annotation("Lorg/example/Other;", Some("return x;"))?;
		assert_eq!(find(&NativeBodies::new(), "A", &class.methods[0])?, None);

		let class = with_annotation("Lnet/java/html/js/JavaScriptBody;", None)?;
		assert!(find(&NativeBodies::new(), "A", &class.methods[0]).is_err());
		Ok(())
	}
}
