use indexmap::IndexMap;
use duke::tree::class::{ClassFile, ClassName};
use crate::mangle;

/// Answers questions about the classes being translated, like where a field is declared.
///
/// Provided classes aren't known here, lookups stop at them.
#[derive(Debug, Clone, Copy)]
pub struct Hierarchy<'a> {
	classes: &'a IndexMap<ClassName, ClassFile>,
}

impl<'a> Hierarchy<'a> {
	pub fn new(classes: &'a IndexMap<ClassName, ClassFile>) -> Hierarchy<'a> {
		Hierarchy { classes }
	}

	pub fn class(&self, name: &str) -> Option<&'a ClassFile> {
		self.classes.get(name)
	}

	pub fn is_interface(&self, name: &str) -> bool {
		self.class(name).is_some_and(|class| class.access.is_interface)
	}

	/// The class declaring the field, searching the class, then its interfaces, and then its super class.
	///
	/// Falls back to the given class if the field isn't found.
	pub fn resolve_field(&self, class: &ClassName, name: &str) -> ClassName {
		self.find_field(class, name).unwrap_or_else(|| class.clone())
	}

	fn find_field(&self, class: &ClassName, name: &str) -> Option<ClassName> {
		let file = self.class(class.as_str())?;
		if file.field(name).is_some() {
			return Some(class.clone());
		}
		file.interfaces.iter()
			.find_map(|interface| self.find_field(interface, name))
			.or_else(|| file.super_class.as_ref().and_then(|super_class| self.find_field(super_class, name)))
	}

	/// The class declaring a method, searching the class and its super classes.
	///
	/// The search stops at the first class that isn't known, check provided classes with
	/// [`crate::runtime::builtin_has_method`].
	pub fn resolve_method(&self, class: &ClassName, name: &str, descriptor: &str) -> ClassName {
		let mut current = class;
		loop {
			let Some(file) = self.class(current.as_str()) else {
				return current.clone();
			};
			if file.method(name, descriptor).is_some() {
				return current.clone();
			}
			match &file.super_class {
				Some(super_class) if !file.access.is_interface => current = super_class,
				_ => return class.clone(),
			}
		}
	}

	/// Whether a known interface of the class or of one of its super classes declares the method, for example as a
	/// default method.
	pub fn interface_declares(&self, class: &ClassName, name: &str, descriptor: &str) -> bool {
		let mut stack: Vec<&ClassName> = Vec::new();
		let mut current = self.class(class.as_str());
		while let Some(file) = current {
			stack.extend(&file.interfaces);
			current = file.super_class.as_ref().and_then(|super_class| self.class(super_class.as_str()));
		}
		while let Some(interface) = stack.pop() {
			let Some(file) = self.class(interface.as_str()) else { continue };
			if file.method(name, descriptor).is_some() {
				return true;
			}
			stack.extend(&file.interfaces);
		}
		false
	}

	/// The number of known super classes.
	fn depth(&self, class: &ClassName) -> usize {
		let mut depth = 0;
		let mut current = self.class(class.as_str());
		while let Some(super_class) = current.and_then(|file| file.super_class.as_ref()) {
			depth += 1;
			current = self.class(super_class.as_str());
		}
		depth
	}

	/// The property an instance field is stored in.
	///
	/// If a super class declares an instance field of the same name, the name gets the depth of the declaring class
	/// appended, so that both fields can live in the same object.
	pub fn instance_field_name(&self, declaring: &ClassName, name: &str) -> String {
		let mangled = mangle::field_name(name);

		let mut super_class = self.class(declaring.as_str()).and_then(|file| file.super_class.as_ref());
		while let Some(current) = super_class.and_then(|name| self.class(name.as_str())) {
			if current.fields.iter().any(|field| field.name == name && !field.access.is_static) {
				return format!("{mangled}${}", self.depth(declaring));
			}
			super_class = current.super_class.as_ref();
		}
		mangled
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use indexmap::IndexMap;
	use pretty_assertions::assert_eq;
	use raw_class_file::{flags, ClassFile};
	use duke::tree::class::ClassName;
	use crate::hierarchy::Hierarchy;

	fn classes() -> Result<IndexMap<ClassName, duke::tree::class::ClassFile>> {
		let mut interface = ClassFile::new("I", Some("java/lang/Object"));
		interface.access_flags = flags::ACC_PUBLIC | flags::ACC_INTERFACE | flags::ACC_ABSTRACT;
		interface.field(flags::ACC_STATIC | flags::ACC_FINAL, "CONSTANT", "I", vec![]);

		let mut a = ClassFile::new("A", Some("java/lang/Object"));
		a.field(0, "x", "I", vec![]);
		a.field(flags::ACC_STATIC, "s", "I", vec![]);
		a.method(0, "m", "()V", vec![]);

		let mut b = ClassFile::new("B", Some("A"));
		b.interface("I");
		b.field(0, "x", "J", vec![]);

		let c = ClassFile::new("C", Some("B"));

		let mut map = IndexMap::new();
		for class in [interface, a, b, c] {
			let class = duke::parse(&class.to_bytes())?;
			map.insert(class.name.clone(), class);
		}
		Ok(map)
	}

	#[test]
	fn fields() -> Result<()> {
		let classes = classes()?;
		let hierarchy = Hierarchy::new(&classes);

		assert_eq!(hierarchy.resolve_field(&ClassName::from("C"), "x"), "B");
		assert_eq!(hierarchy.resolve_field(&ClassName::from("C"), "s"), "A");
		assert_eq!(hierarchy.resolve_field(&ClassName::from("C"), "CONSTANT"), "I");
		assert_eq!(hierarchy.resolve_field(&ClassName::from("C"), "unknown"), "C");

		assert_eq!(hierarchy.instance_field_name(&ClassName::from("A"), "x"), "fld_x");
		assert_eq!(hierarchy.instance_field_name(&ClassName::from("B"), "x"), "fld_x$2");
		Ok(())
	}

	#[test]
	fn methods() -> Result<()> {
		let classes = classes()?;
		let hierarchy = Hierarchy::new(&classes);

		assert_eq!(hierarchy.resolve_method(&ClassName::from("C"), "m", "()V"), "A");
		assert_eq!(hierarchy.resolve_method(&ClassName::from("C"), "<init>", "()V"), "java/lang/Object");
		assert_eq!(hierarchy.resolve_method(&ClassName::from("I"), "other", "()V"), "I");
		assert!(hierarchy.is_interface("I"));
		assert!(!hierarchy.is_interface("A"));
		assert!(!hierarchy.is_interface("java/lang/Object"));
		Ok(())
	}

	#[test]
	fn interface_methods() -> Result<()> {
		let mut classes = classes()?;
		let mut j = ClassFile::new("J", Some("java/lang/Object"));
		j.access_flags = flags::ACC_PUBLIC | flags::ACC_INTERFACE | flags::ACC_ABSTRACT;
		j.interface("I");
		j.method(flags::ACC_PUBLIC, "run", "()V", vec![]);
		let mut d = ClassFile::new("D", Some("C"));
		d.interface("J");
		for class in [j, d] {
			let class = duke::parse(&class.to_bytes())?;
			classes.insert(class.name.clone(), class);
		}
		let hierarchy = Hierarchy::new(&classes);

		assert!(hierarchy.interface_declares(&ClassName::from("D"), "run", "()V"));
		assert!(!hierarchy.interface_declares(&ClassName::from("C"), "run", "()V"));
		assert!(!hierarchy.interface_declares(&ClassName::from("D"), "m", "()V"));
		Ok(())
	}
}
