use pretty_assertions::assert_eq;
use raw_class_file::{flags, Annotation, AttributeInfo, ClassFile, ElementValue, ElementValuePairsEntry};

#[test]
fn class_with_constant_field() {
	let mut class = ClassFile::new("A", None);
	let attribute_name_index = class.pool.utf8("ConstantValue");
	let constantvalue_index = class.pool.integer(7);
	class.field(flags::ACC_STATIC, "x", "I", vec![
		AttributeInfo::ConstantValue { attribute_name_index, constantvalue_index },
	]);

	let mut expected = vec![
		0xca, 0xfe, 0xba, 0xbe,
		0, 0, 0, 52,
		0, 7,
		1, 0, 1, b'A',
		7, 0, 1,
		1, 0, 13,
	];
	expected.extend(b"ConstantValue");
	expected.extend([
		3, 0, 0, 0, 7,
		1, 0, 1, b'x',
		1, 0, 1, b'I',
		0, 0x21, 0, 2, 0, 0,
		0, 0,
		0, 1,
		0, 0x08, 0, 5, 0, 6, 0, 1,
		0, 3, 0, 0, 0, 2, 0, 4,
		0, 0,
		0, 0,
	]);

	assert_eq!(class.to_bytes(), expected);
}

#[test]
fn nested_annotation_bytes() {
	let mut class = ClassFile::new("A", Some("java/lang/Object"));
	let type_index = class.pool.utf8("LAnno;");
	let name = class.pool.utf8("value");
	let annotation = Annotation {
		type_index,
		element_value_pairs: vec![
			ElementValuePairsEntry {
				element_name_index: name,
				value: ElementValue::Array {
					values: vec![
						ElementValue::Annotation {
							annotation_value: Annotation { type_index, element_value_pairs: vec![] },
						},
					],
				},
			},
		],
	};

	assert_eq!(Annotation::attribute_info(&[annotation]), vec![
		0, 1,
		0, type_index as u8, 0, 1,
		0, name as u8, b'[', 0, 1,
		b'@', 0, type_index as u8, 0, 0,
	]);
}
