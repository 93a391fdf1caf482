mod common;
mod gateway_stub;

mod admin_test;
mod base_test;
mod docs_test;
mod messages_test;
mod profiles_test;
