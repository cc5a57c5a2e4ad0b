use std::collections::HashMap;

/// A constant pool entry, exactly as it's written out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CpInfo {
	Class { name_index: u16 },
	Fieldref { class_index: u16, name_and_type_index: u16 },
	Methodref { class_index: u16, name_and_type_index: u16 },
	InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
	String { string_index: u16 },
	Integer { bytes: u32 },
	Float { bytes: u32 },
	Long { high_bytes: u32, low_bytes: u32 },
	Double { high_bytes: u32, low_bytes: u32 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	Utf8 { bytes: Vec<u8> },
	MethodHandle { reference_kind: u8, reference_index: u16 },
	MethodType { descriptor_index: u16 },
	Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	Module { name_index: u16 },
	Package { name_index: u16 },
	/// Any tag with any contents, for producing malformed pools.
	Raw { tag: u8, bytes: Vec<u8> },
}

impl CpInfo {
	/// `Long` and `Double` take up two indices.
	pub fn is_wide(&self) -> bool {
		matches!(self, CpInfo::Long { .. } | CpInfo::Double { .. })
	}

	pub fn write(&self, out: &mut Vec<u8>) {
		fn two(out: &mut Vec<u8>, tag: u8, a: u16, b: u16) {
			out.push(tag);
			out.extend(a.to_be_bytes());
			out.extend(b.to_be_bytes());
		}
		fn one(out: &mut Vec<u8>, tag: u8, a: u16) {
			out.push(tag);
			out.extend(a.to_be_bytes());
		}

		match self {
			CpInfo::Class { name_index } => one(out, 7, *name_index),
			CpInfo::Fieldref { class_index, name_and_type_index } => two(out, 9, *class_index, *name_and_type_index),
			CpInfo::Methodref { class_index, name_and_type_index } => two(out, 10, *class_index, *name_and_type_index),
			CpInfo::InterfaceMethodref { class_index, name_and_type_index } => two(out, 11, *class_index, *name_and_type_index),
			CpInfo::String { string_index } => one(out, 8, *string_index),
			CpInfo::Integer { bytes } => {
				out.push(3);
				out.extend(bytes.to_be_bytes());
			},
			CpInfo::Float { bytes } => {
				out.push(4);
				out.extend(bytes.to_be_bytes());
			},
			CpInfo::Long { high_bytes, low_bytes } => {
				out.push(5);
				out.extend(high_bytes.to_be_bytes());
				out.extend(low_bytes.to_be_bytes());
			},
			CpInfo::Double { high_bytes, low_bytes } => {
				out.push(6);
				out.extend(high_bytes.to_be_bytes());
				out.extend(low_bytes.to_be_bytes());
			},
			CpInfo::NameAndType { name_index, descriptor_index } => two(out, 12, *name_index, *descriptor_index),
			CpInfo::Utf8 { bytes } => {
				out.push(1);
				out.extend((bytes.len() as u16).to_be_bytes());
				out.extend(bytes);
			},
			CpInfo::MethodHandle { reference_kind, reference_index } => {
				out.push(15);
				out.push(*reference_kind);
				out.extend(reference_index.to_be_bytes());
			},
			CpInfo::MethodType { descriptor_index } => one(out, 16, *descriptor_index),
			CpInfo::Dynamic { bootstrap_method_attr_index, name_and_type_index } => {
				two(out, 17, *bootstrap_method_attr_index, *name_and_type_index)
			},
			CpInfo::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
				two(out, 18, *bootstrap_method_attr_index, *name_and_type_index)
			},
			CpInfo::Module { name_index } => one(out, 19, *name_index),
			CpInfo::Package { name_index } => one(out, 20, *name_index),
			CpInfo::Raw { tag, bytes } => {
				out.push(*tag);
				out.extend(bytes);
			},
		}
	}
}

/// Encodes a string in the "modified utf8" of class files: `\0` takes two bytes and supplementary characters are
/// written as two surrogates of three bytes each.
pub fn modified_utf8(string: &str) -> Vec<u8> {
	let mut out = Vec::with_capacity(string.len());
	for unit in string.encode_utf16() {
		match unit {
			0x0001..=0x007f => out.push(unit as u8),
			0x0000 | 0x0080..=0x07ff => {
				out.push(0xc0 | (unit >> 6) as u8);
				out.push(0x80 | (unit & 0x3f) as u8);
			},
			_ => {
				out.push(0xe0 | (unit >> 12) as u8);
				out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
				out.push(0x80 | (unit & 0x3f) as u8);
			},
		}
	}
	out
}

/// Builds a constant pool, handing out the index of each entry.
///
/// Adding the same entry twice gives the same index, like `javac` does it.
///
/// ```
/// use raw_class_file::PoolBuilder;
/// let mut pool = PoolBuilder::new();
/// let a = pool.class("org/example/Main");
/// let b = pool.class("org/example/Main");
/// assert_eq!(a, b);
/// assert_eq!(a, 2); // the name comes first
/// ```
#[derive(Debug, Clone, Default)]
pub struct PoolBuilder {
	entries: Vec<CpInfo>,
	indices: HashMap<CpInfo, u16>,
	next: u16,
}

impl PoolBuilder {
	pub fn new() -> PoolBuilder {
		PoolBuilder { entries: Vec::new(), indices: HashMap::new(), next: 1 }
	}

	/// The `constant_pool_count` item, one more than the highest index.
	pub fn count(&self) -> u16 {
		self.next
	}

	pub fn entries(&self) -> &[CpInfo] {
		&self.entries
	}

	/// Adds an entry, or returns the index of an equal entry added before.
	pub fn add(&mut self, entry: CpInfo) -> u16 {
		if let Some(&index) = self.indices.get(&entry) {
			return index;
		}
		let index = self.push(entry.clone());
		self.indices.insert(entry, index);
		index
	}

	/// Adds an entry without looking for an equal one.
	pub fn push(&mut self, entry: CpInfo) -> u16 {
		let index = self.next;
		self.next += if entry.is_wide() { 2 } else { 1 };
		self.entries.push(entry);
		index
	}

	pub fn raw(&mut self, tag: u8, bytes: Vec<u8>) -> u16 {
		self.push(CpInfo::Raw { tag, bytes })
	}

	pub fn utf8(&mut self, string: &str) -> u16 {
		self.add(CpInfo::Utf8 { bytes: modified_utf8(string) })
	}

	pub fn integer(&mut self, value: i32) -> u16 {
		self.add(CpInfo::Integer { bytes: value as u32 })
	}

	pub fn float(&mut self, value: f32) -> u16 {
		self.add(CpInfo::Float { bytes: value.to_bits() })
	}

	pub fn long(&mut self, value: i64) -> u16 {
		let value = value as u64;
		self.add(CpInfo::Long { high_bytes: (value >> 32) as u32, low_bytes: value as u32 })
	}

	pub fn double(&mut self, value: f64) -> u16 {
		let value = value.to_bits();
		self.add(CpInfo::Double { high_bytes: (value >> 32) as u32, low_bytes: value as u32 })
	}

	pub fn class(&mut self, name: &str) -> u16 {
		let name_index = self.utf8(name);
		self.add(CpInfo::Class { name_index })
	}

	pub fn string(&mut self, string: &str) -> u16 {
		let string_index = self.utf8(string);
		self.add(CpInfo::String { string_index })
	}

	pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
		let name_index = self.utf8(name);
		let descriptor_index = self.utf8(descriptor);
		self.add(CpInfo::NameAndType { name_index, descriptor_index })
	}

	pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
		let class_index = self.class(class);
		let name_and_type_index = self.name_and_type(name, descriptor);
		self.add(CpInfo::Fieldref { class_index, name_and_type_index })
	}

	pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
		let class_index = self.class(class);
		let name_and_type_index = self.name_and_type(name, descriptor);
		self.add(CpInfo::Methodref { class_index, name_and_type_index })
	}

	pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
		let class_index = self.class(class);
		let name_and_type_index = self.name_and_type(name, descriptor);
		self.add(CpInfo::InterfaceMethodref { class_index, name_and_type_index })
	}

	pub fn method_handle(&mut self, reference_kind: u8, reference_index: u16) -> u16 {
		self.add(CpInfo::MethodHandle { reference_kind, reference_index })
	}

	pub fn method_type(&mut self, descriptor: &str) -> u16 {
		let descriptor_index = self.utf8(descriptor);
		self.add(CpInfo::MethodType { descriptor_index })
	}

	pub fn invoke_dynamic(&mut self, bootstrap_method_attr_index: u16, name: &str, descriptor: &str) -> u16 {
		let name_and_type_index = self.name_and_type(name, descriptor);
		self.add(CpInfo::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index })
	}

	/// Writes the `constant_pool_count` and `constant_pool` items.
	pub fn write(&self, out: &mut Vec<u8>) {
		out.extend(self.next.to_be_bytes());
		for entry in &self.entries {
			entry.write(out);
		}
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let mut out = Vec::new();
		self.write(&mut out);
		out
	}
}
