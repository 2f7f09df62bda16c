pub mod audit;
pub mod backlink;
pub mod business;
pub mod campaign;
pub mod keyword;
pub mod scan;
pub mod site;

pub use audit::*;
pub use backlink::*;
pub use business::*;
pub use campaign::*;
pub use keyword::*;
pub use scan::*;
pub use site::*;
