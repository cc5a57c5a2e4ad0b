//! Reading the string format used in the Java Virtual Machine Specification.
//!
//! That format is a "modified utf8": supplementary characters are stored as two 3 byte surrogates, and `\0` is
//! stored using two bytes.
//!
//! See <https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.4.7> for the complete specification of
//! the string format used in the Java Virtual Machine Specification.

use anyhow::{anyhow, Context, Result};
use java_string::JavaString;

/// Takes in a vec of data, tries to read it into a [`JavaString`].
pub(crate) fn from_vec_to_string(vec: Vec<u8>) -> Result<JavaString> {
	JavaString::from_modified_utf8(vec)
		.with_context(|| anyhow!("invalid java utf8 contents"))
}
