use anyhow::Result;
use indexmap::IndexMap;
use java_string::JavaString;
use pretty_assertions::assert_eq;
use raw_class_file::{flags, Annotation as RawAnnotation, ClassFile, ElementValue, ElementValuePairsEntry};
use duke::DecodeError;
use duke::tree::annotation::{Annotation, AnnotationValue};
use duke::tree::field::ConstantValue;

const JAVA_SCRIPT_BODY: &str = "Lnet/java/html/js/JavaScriptBody;";

fn pair(element_name_index: u16, value: ElementValue) -> ElementValuePairsEntry {
	ElementValuePairsEntry { element_name_index, value }
}

#[test]
fn java_script_body_on_a_method() -> Result<()> {
	let mut class = ClassFile::new("org/apidesign/vm4brwsr/SieveTest", Some("java/lang/Object"));
	let type_index = class.pool.utf8(JAVA_SCRIPT_BODY);
	let args = class.pool.utf8("args");
	let body = class.pool.utf8("body");
	let a = class.pool.utf8("a");
	let code = class.pool.utf8("return a * 2;");

	let annotation = RawAnnotation {
		type_index,
		element_value_pairs: vec![
			pair(args, ElementValue::Array { values: vec![ElementValue::String { const_value_index: a }] }),
			pair(body, ElementValue::String { const_value_index: code }),
		],
	};
	let attribute = class.annotations(false, vec![annotation]);
	class.method(flags::ACC_STATIC | flags::ACC_NATIVE, "twice", "(I)I", vec![attribute]);

	let class = duke::parse(&class.to_bytes())?;
	let method = class.method("twice", "(I)I").expect("method is there");

	assert!(method.runtime_visible_annotations.is_empty());
	let annotation = method.annotation(JAVA_SCRIPT_BODY).expect("annotation is found among the invisible ones");

	let args: Vec<_> = annotation.get("args")
		.and_then(AnnotationValue::as_array)
		.expect("args is an array")
		.iter()
		.map(|value| value.as_string().and_then(|x| x.as_str().ok()).map(str::to_owned))
		.collect();
	assert_eq!(args, vec![Some("a".to_owned())]);
	let body = annotation.get("body")
		.and_then(AnnotationValue::as_string)
		.and_then(|x| x.as_str().ok());
	assert_eq!(body, Some("return a * 2;"));
	Ok(())
}

#[test]
fn all_kinds_nested() -> Result<()> {
	let mut class = ClassFile::new("A", Some("java/lang/Object"));
	let outer_type = class.pool.utf8("LOuter;");
	let inner_type = class.pool.utf8("LInner;");
	let names: Vec<u16> = ["i", "j", "f", "d", "z", "s", "e", "c", "a", "n"].into_iter()
		.map(|name| class.pool.utf8(name))
		.collect();
	let int = class.pool.integer(42);
	let long = class.pool.long(1 << 40);
	let float = class.pool.float(0.5);
	let double = class.pool.double(2.5);
	let one = class.pool.integer(1);
	let string = class.pool.utf8("text");
	let enum_type = class.pool.utf8("Ljava/lang/annotation/RetentionPolicy;");
	let enum_name = class.pool.utf8("RUNTIME");
	let class_literal = class.pool.utf8("Ljava/lang/String;");
	let bytes = class.to_bytes();
	let pool = duke::parse(&bytes)?.pool;

	let inner = RawAnnotation {
		type_index: inner_type,
		element_value_pairs: vec![pair(names[0], ElementValue::Char { const_value_index: int })],
	};
	let outer = RawAnnotation {
		type_index: outer_type,
		element_value_pairs: vec![
			pair(names[0], ElementValue::Integer { const_value_index: int }),
			pair(names[1], ElementValue::Long { const_value_index: long }),
			pair(names[2], ElementValue::Float { const_value_index: float }),
			pair(names[3], ElementValue::Double { const_value_index: double }),
			pair(names[4], ElementValue::Boolean { const_value_index: one }),
			pair(names[5], ElementValue::String { const_value_index: string }),
			pair(names[6], ElementValue::Enum { type_name_index: enum_type, const_name_index: enum_name }),
			pair(names[7], ElementValue::Class { class_info_index: class_literal }),
			pair(names[8], ElementValue::Array { values: vec![
				ElementValue::Annotation { annotation_value: inner.clone() },
				ElementValue::Array { values: vec![] },
			] }),
			pair(names[9], ElementValue::Annotation { annotation_value: inner }),
		],
	};

	let decoded = duke::decode_annotations(&RawAnnotation::attribute_info(&[outer]), &pool)?;

	let mut inner_elements = IndexMap::new();
	inner_elements.insert("i".to_owned(), AnnotationValue::Primitive('C', ConstantValue::Integer(42)));
	let inner = Annotation { type_descriptor: "LInner;".to_owned(), elements: inner_elements };

	let owner = "LOuter;".to_owned();
	assert_eq!(decoded, vec![
		(owner.clone(), "i".to_owned(), AnnotationValue::Primitive('I', ConstantValue::Integer(42))),
		(owner.clone(), "j".to_owned(), AnnotationValue::Primitive('J', ConstantValue::Long(1 << 40))),
		(owner.clone(), "f".to_owned(), AnnotationValue::Primitive('F', ConstantValue::Float(0.5))),
		(owner.clone(), "d".to_owned(), AnnotationValue::Primitive('D', ConstantValue::Double(2.5))),
		(owner.clone(), "z".to_owned(), AnnotationValue::Primitive('Z', ConstantValue::Integer(1))),
		(owner.clone(), "s".to_owned(), AnnotationValue::Primitive('s', ConstantValue::String(JavaString::from("text")))),
		(owner.clone(), "e".to_owned(), AnnotationValue::EnumConstant {
			type_descriptor: "Ljava/lang/annotation/RetentionPolicy;".to_owned(),
			const_name: "RUNTIME".to_owned(),
		}),
		(owner.clone(), "c".to_owned(), AnnotationValue::ClassLiteral("Ljava/lang/String;".to_owned())),
		(owner.clone(), "a".to_owned(), AnnotationValue::Array(vec![
			AnnotationValue::Nested(inner.clone()),
			AnnotationValue::Array(vec![]),
		])),
		(owner, "n".to_owned(), AnnotationValue::Nested(inner)),
	]);
	Ok(())
}

#[test]
fn unknown_tag() -> Result<()> {
	let mut class = ClassFile::new("A", None);
	let type_index = class.pool.utf8("LX;");
	let name = class.pool.utf8("v");
	let pool = duke::parse(&class.to_bytes())?.pool;

	let annotation = RawAnnotation {
		type_index,
		element_value_pairs: vec![pair(name, ElementValue::Raw { tag: b'x', bytes: vec![0, 1] })],
	};
	let error = duke::decode_annotations(&RawAnnotation::attribute_info(&[annotation]), &pool).unwrap_err();
	assert_eq!(error.downcast_ref::<DecodeError>(), Some(&DecodeError::UnknownAnnotationTag { tag: b'x' }));
	Ok(())
}

#[test]
fn wrong_constant_kind() -> Result<()> {
	let mut class = ClassFile::new("A", None);
	let type_index = class.pool.utf8("LX;");
	let name = class.pool.utf8("v");
	let pool = duke::parse(&class.to_bytes())?.pool;

	// an `I` must point to an `Integer`, not to an `Utf8`
	let annotation = RawAnnotation {
		type_index,
		element_value_pairs: vec![pair(name, ElementValue::Integer { const_value_index: name })],
	};
	let error = duke::decode_annotations(&RawAnnotation::attribute_info(&[annotation]), &pool).unwrap_err();
	assert!(matches!(error.downcast_ref::<DecodeError>(), Some(DecodeError::PoolTagMismatch { .. })));
	Ok(())
}

#[test]
fn nesting_is_bounded() -> Result<()> {
	let mut class = ClassFile::new("A", None);
	let type_index = class.pool.utf8("LX;");
	let name = class.pool.utf8("v");
	let pool = duke::parse(&class.to_bytes())?.pool;

	let mut value = ElementValue::Array { values: vec![] };
	for _ in 0..100 {
		value = ElementValue::Array { values: vec![value] };
	}
	let annotation = RawAnnotation { type_index, element_value_pairs: vec![pair(name, value)] };

	let error = duke::decode_annotations(&RawAnnotation::attribute_info(&[annotation]), &pool).unwrap_err();
	assert_eq!(error.downcast_ref::<DecodeError>(), Some(&DecodeError::AnnotationTooDeep { limit: 64 }));
	Ok(())
}

#[test]
fn leftover_bytes() -> Result<()> {
	let mut class = ClassFile::new("A", None);
	let type_index = class.pool.utf8("LX;");
	let pool = duke::parse(&class.to_bytes())?.pool;

	let mut bytes = RawAnnotation::attribute_info(&[RawAnnotation { type_index, element_value_pairs: vec![] }]);
	bytes.push(0);

	let error = duke::decode_annotations(&bytes, &pool).unwrap_err();
	assert_eq!(error.downcast_ref::<DecodeError>(), Some(&DecodeError::AttributeLength {
		name: "annotations".to_owned(),
		declared: 7,
		consumed: 6,
	}));
	Ok(())
}
