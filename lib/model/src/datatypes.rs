/// One entry of the standard datatype registry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StandardDatatype {
    pub uri: &'static str,
    pub name: &'static str,
}

const fn xsd(uri: &'static str, name: &'static str) -> StandardDatatype {
    StandardDatatype { uri, name }
}

/// The canonical XSD and RDF datatypes bootstrapped into every new space.
///
/// Ids are assigned by insertion order on a fresh space, but nothing may rely
/// on that: the contract is only that a datatype id, once assigned, is stable
/// for the lifetime of the space.
pub const STANDARD_DATATYPES: &[StandardDatatype] = &[
    // XSD datatypes
    xsd("http://www.w3.org/2001/XMLSchema#string", "string"),
    xsd("http://www.w3.org/2001/XMLSchema#boolean", "boolean"),
    xsd("http://www.w3.org/2001/XMLSchema#decimal", "decimal"),
    xsd("http://www.w3.org/2001/XMLSchema#integer", "integer"),
    xsd("http://www.w3.org/2001/XMLSchema#double", "double"),
    xsd("http://www.w3.org/2001/XMLSchema#float", "float"),
    xsd("http://www.w3.org/2001/XMLSchema#date", "date"),
    xsd("http://www.w3.org/2001/XMLSchema#time", "time"),
    xsd("http://www.w3.org/2001/XMLSchema#dateTime", "dateTime"),
    xsd("http://www.w3.org/2001/XMLSchema#gYear", "gYear"),
    xsd("http://www.w3.org/2001/XMLSchema#gMonth", "gMonth"),
    xsd("http://www.w3.org/2001/XMLSchema#gDay", "gDay"),
    xsd("http://www.w3.org/2001/XMLSchema#gYearMonth", "gYearMonth"),
    xsd("http://www.w3.org/2001/XMLSchema#gMonthDay", "gMonthDay"),
    xsd("http://www.w3.org/2001/XMLSchema#duration", "duration"),
    xsd("http://www.w3.org/2001/XMLSchema#yearMonthDuration", "yearMonthDuration"),
    xsd("http://www.w3.org/2001/XMLSchema#dayTimeDuration", "dayTimeDuration"),
    xsd("http://www.w3.org/2001/XMLSchema#byte", "byte"),
    xsd("http://www.w3.org/2001/XMLSchema#short", "short"),
    xsd("http://www.w3.org/2001/XMLSchema#int", "int"),
    xsd("http://www.w3.org/2001/XMLSchema#long", "long"),
    xsd("http://www.w3.org/2001/XMLSchema#unsignedByte", "unsignedByte"),
    xsd("http://www.w3.org/2001/XMLSchema#unsignedShort", "unsignedShort"),
    xsd("http://www.w3.org/2001/XMLSchema#unsignedInt", "unsignedInt"),
    xsd("http://www.w3.org/2001/XMLSchema#unsignedLong", "unsignedLong"),
    xsd("http://www.w3.org/2001/XMLSchema#positiveInteger", "positiveInteger"),
    xsd("http://www.w3.org/2001/XMLSchema#nonNegativeInteger", "nonNegativeInteger"),
    xsd("http://www.w3.org/2001/XMLSchema#negativeInteger", "negativeInteger"),
    xsd("http://www.w3.org/2001/XMLSchema#nonPositiveInteger", "nonPositiveInteger"),
    xsd("http://www.w3.org/2001/XMLSchema#hexBinary", "hexBinary"),
    xsd("http://www.w3.org/2001/XMLSchema#base64Binary", "base64Binary"),
    xsd("http://www.w3.org/2001/XMLSchema#anyURI", "anyURI"),
    xsd("http://www.w3.org/2001/XMLSchema#language", "language"),
    xsd("http://www.w3.org/2001/XMLSchema#normalizedString", "normalizedString"),
    xsd("http://www.w3.org/2001/XMLSchema#token", "token"),
    xsd("http://www.w3.org/2001/XMLSchema#NMTOKEN", "NMTOKEN"),
    xsd("http://www.w3.org/2001/XMLSchema#Name", "Name"),
    xsd("http://www.w3.org/2001/XMLSchema#NCName", "NCName"),
    xsd("http://www.w3.org/2001/XMLSchema#ENTITY", "ENTITY"),
    xsd("http://www.w3.org/2001/XMLSchema#ID", "ID"),
    xsd("http://www.w3.org/2001/XMLSchema#IDREF", "IDREF"),
    // RDF datatypes
    xsd("http://www.w3.org/1999/02/22-rdf-syntax-ns#XMLLiteral", "XMLLiteral"),
    xsd("http://www.w3.org/1999/02/22-rdf-syntax-ns#HTML", "HTML"),
    xsd("http://www.w3.org/1999/02/22-rdf-syntax-ns#langString", "langString"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uris_are_unique() {
        let uris: HashSet<_> = STANDARD_DATATYPES.iter().map(|d| d.uri).collect();
        assert_eq!(uris.len(), STANDARD_DATATYPES.len());
    }

    #[test]
    fn covers_the_usual_suspects() {
        let uris: HashSet<_> = STANDARD_DATATYPES.iter().map(|d| d.uri).collect();
        for required in [
            "http://www.w3.org/2001/XMLSchema#string",
            "http://www.w3.org/2001/XMLSchema#integer",
            "http://www.w3.org/2001/XMLSchema#dateTime",
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString",
        ] {
            assert!(uris.contains(required), "missing {required}");
        }
    }
}
