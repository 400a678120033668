//! Remote generation-job subsystem: catalog discovery, schema inference,
//! parameter synthesis and the signed submit/poll protocol.

pub mod catalog;
pub mod gateway;
pub mod params;
pub mod schema;
pub mod task;
pub mod transport;

pub use catalog::{ModelCatalog, ModelDescriptor};
pub use gateway::{GenerationGateway, GenerationResult};
pub use params::synthesize;
pub use schema::{parse_model_inputs, ParamKind, ParamOption, ParameterSpec};
pub use task::{GenerationTask, TaskState, SUCCESS_STATUS, TERMINAL_STATUSES};
pub use transport::{GenerationTransport, TaskOutput};
