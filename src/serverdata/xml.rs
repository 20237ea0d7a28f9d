//! Error type for the XML-defined server-data categories. Parsing itself
//! happens through the data store so layered search paths apply the same
//! first-hit-wins rule XML categories get as any other virtual path; see
//! `serverdata::load_category`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlLoadError {
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: quick_xml::DeError,
    },
}
