use rocket::config::{Config, LogLevel};
use rocket::serde::json::{json, Json, Value};
use rocket::{post, routes, State};
use std::net::{Ipv4Addr, TcpStream};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

const PORT: u16 = 9091;

type CheckStatus = Arc<Mutex<String>>;

/// Local stand-in for the payment gateway. Checkouts always open; status
/// checks answer whatever was last set with `answer`.
pub struct StubGateway {
    status: CheckStatus,
}

impl StubGateway {
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", PORT)
    }

    pub fn answer(&self, status: &str) {
        *self.status.lock().unwrap() = status.to_owned();
    }

    pub fn checkout_url(transaction_id: &str) -> String {
        format!("https://checkout.test/p/{}", transaction_id)
    }
}

#[post("/v2/payment", data = "<body>")]
fn checkout(body: Json<Value>) -> Value {
    let transaction_id = body["transaction_id"].as_str().unwrap_or_default();
    json!({
        "code": "201",
        "message": "CREATED",
        "data": { "payment_token": "token", "payment_url": StubGateway::checkout_url(transaction_id) },
    })
}

#[post("/v2/payment/check")]
fn check(status: &State<CheckStatus>) -> Value {
    let status = status.lock().unwrap().clone();
    json!({ "code": "00", "message": "SUCCES", "data": { "status": status } })
}

static GATEWAY: OnceLock<StubGateway> = OnceLock::new();

/// Starts the stub on first use; it lives as long as the test binary.
pub fn gateway() -> &'static StubGateway {
    GATEWAY.get_or_init(|| {
        let status: CheckStatus = Arc::new(Mutex::new(String::from("WAITING_CUSTOMER_PAYMENT")));
        let config = Config {
            address: Ipv4Addr::LOCALHOST.into(),
            port: PORT,
            log_level: LogLevel::Off,
            ..Config::debug_default()
        };
        let stub = rocket::custom(config)
            .manage(status.clone())
            .mount("/", routes![checkout, check]);
        thread::spawn(move || {
            let _ = rocket::execute(stub.launch());
        });
        for _ in 0..50 {
            if TcpStream::connect((Ipv4Addr::LOCALHOST, PORT)).is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
        StubGateway { status }
    })
}
