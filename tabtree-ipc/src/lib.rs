pub mod command;
pub mod event;
pub mod host;
pub mod node;

pub use command::{Command, Disposition, Response};
pub use event::{EventFilter, SubscribeRequest, TreeEvent};
pub use host::{HostEvent, HostReply, HostRequest, HostTab, HostWindow, TabChanges};
pub use node::{
    ElemType, NodeData, NodeId, NodePatch, NodeRecord, PageInfo, PageStatus, TabId, WindowId,
    WindowInfo, WindowType,
};
