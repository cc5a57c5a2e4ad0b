use anyhow::Result;
use pretty_assertions::assert_eq;
use duke::tree::class::ClassName;
use duke::tree::descriptor::{MethodDescriptor, Type};

#[test]
fn array_dimension_limit() -> Result<()> {
	let max = format!("{}I", "[".repeat(255));
	assert!(Type::parse(&max).is_ok());

	let too_many = format!("{}I", "[".repeat(256));
	assert!(Type::parse(&too_many).is_err());

	Ok(())
}

#[test]
fn valid_field_descriptors() -> Result<()> {
	let valid_field_descriptors = [
		"B",
		"C",
		"D",
		"F",
		"I",
		"J",
		"Ljava/lang/Object;",
		"Lorg/example/MyClassName;",
		"S",
		"Z",
		"[[[D",
	];

	for i in valid_field_descriptors {
		let t = Type::parse(i)?;
		assert_eq!(t.to_string(), i, "{:?} is a valid field desc and displays the same", i);
	}

	Ok(())
}

#[test]
fn invalid_field_descriptors() -> Result<()> {
	let invalid_field_descriptors = [
		"",
		"V",
		"(",
		")",
		"()",
		"[V",
		"L;",
		"()V",
		"foo",
		"(D)I",
		"L;DV",
		"Ljava/lang/Object",
		"II",
	];

	for i in invalid_field_descriptors {
		assert!(Type::parse(i).is_err(), "{:?} is an invalid field desc", i);
	}

	Ok(())
}

#[test]
fn method_descriptors() -> Result<()> {
	let desc = MethodDescriptor::parse("(IJ[Ljava/lang/String;D)V")?;
	assert_eq!(desc.parameters, vec![
		Type::I,
		Type::J,
		Type::Array(Box::new(Type::Object(ClassName::from("java/lang/String")))),
		Type::D,
	]);
	assert_eq!(desc.return_type, None);
	assert_eq!(desc.parameter_slots(), 6);

	let desc = MethodDescriptor::parse("()Ljava/lang/Object;")?;
	assert_eq!(desc.parameters, vec![]);
	assert_eq!(desc.return_type, Some(Type::Object(ClassName::from("java/lang/Object"))));

	Ok(())
}

#[test]
fn invalid_method_descriptors() -> Result<()> {
	let invalid_method_descriptors = [
		"",
		"V",
		"I",
		"(",
		"()",
		"(V)V",
		"(I)VV",
		"(L;)V",
		"I()V",
	];

	for i in invalid_method_descriptors {
		assert!(MethodDescriptor::parse(i).is_err(), "{:?} is an invalid method desc", i);
	}

	Ok(())
}
