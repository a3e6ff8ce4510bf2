//! Service Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("embedded asset not found: {_0}")]
    AssetNotFound(#[error(not(source))] &'static str),
    #[display("could not render page")]
    Template,
    #[display("server stopped unexpectedly")]
    Server,
}
