pub mod category;
pub mod channel;
pub mod server;
pub mod server_member;
pub mod user;

pub use category::{Entity as Category, Model as CategoryModel};
pub use channel::{ChannelName, Entity as Channel, Model as ChannelModel};
pub use server::{Entity as Server, Model as ServerModel};
pub use server_member::Entity as ServerMember;
pub use user::{Entity as User, Model as UserModel};
