pub mod chainlink_job;
pub mod chainlink_node;

pub use chainlink_job::{ChainlinkJob, ChainlinkJobSpec, ChainlinkJobStatus};
pub use chainlink_node::{ChainlinkNode, ChainlinkNodeSpec, ChainlinkNodeStatus};
