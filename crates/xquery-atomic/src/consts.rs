/// XML Schema namespace for the `xs:` atomic types.
pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
/// Function namespace for `fn:`.
pub const FNS: &str = "http://www.w3.org/2005/xpath-functions";
/// Namespace of the `math:` functions.
pub const MATH_NS: &str = "http://www.w3.org/2005/xpath-functions/math";
/// Namespace of W3C error codes (`err:`).
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of the wrapped host-object type.
pub const HOST_NS: &str = "urn:xquery-atomic:host";

pub const CODEPOINT_URI: &str = "http://www.w3.org/2005/xpath-functions/collation/codepoint";
pub const SIMPLE_CASE_URI: &str = "urn:xquery-atomic:collation:simple-case";
pub const SIMPLE_ACCENT_URI: &str = "urn:xquery-atomic:collation:simple-accent";
pub const SIMPLE_CASE_ACCENT_URI: &str = "urn:xquery-atomic:collation:simple-case-accent";
