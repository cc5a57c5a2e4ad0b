/// Represents a class file version.
///
/// Take a look at [the list of class file versions](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.1-200-B.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
	pub major: u16,
	pub minor: u16,
}

impl Version {
	pub const V1_8: Version = Version::new(52, 0);

	pub const fn new(major: u16, minor: u16) -> Version {
		Version { major, minor }
	}
}
