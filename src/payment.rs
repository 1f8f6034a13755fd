use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::engine::now_ms;
use crate::model::{Booking, BookingStatus};

type HmacSha256 = Hmac<Sha256>;

/// Gateway credentials and URLs. Injected at startup, never read from globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfig {
    /// `.../v2/gateway/api/create`
    pub endpoint: String,
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    /// Where the gateway posts the settlement callback.
    pub ipn_url: String,
    /// Where the guest's browser lands after paying.
    pub redirect_url: String,
}

impl PaymentConfig {
    pub const ORDER_INFO: &'static str = "Pay with MoMo";
    pub const REQUEST_TYPE: &'static str = "payWithMethod";
    pub const LANG: &'static str = "vi";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub pay_url: String,
    pub request_id: String,
}

#[derive(Debug)]
pub enum PaymentError {
    /// The gateway could not be reached or answered garbage.
    Transport(String),
    /// The gateway answered with a non-zero result code.
    Rejected { result_code: i64, message: String },
    Signing(String),
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentError::Transport(e) => write!(f, "payment gateway unreachable: {e}"),
            PaymentError::Rejected {
                result_code,
                message,
            } => write!(f, "payment gateway rejected request ({result_code}): {message}"),
            PaymentError::Signing(e) => write!(f, "request signing failed: {e}"),
        }
    }
}

impl std::error::Error for PaymentError {}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        PaymentError::Transport(e.to_string())
    }
}

/// Opens payment sessions for bookings. The settlement result comes back
/// later through the webhook; `verify_callback` decides whether to trust it.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, booking: &Booking) -> Result<PaymentSession, PaymentError>;

    /// Whether the callback carries a valid gateway signature.
    fn verify_callback(&self, callback: &PaymentCallback) -> bool;
}

/// Settlement callback (IPN) body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentCallback {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    pub order_info: String,
    pub order_type: String,
    pub trans_id: i64,
    pub result_code: i64,
    pub message: String,
    pub pay_type: String,
    pub response_time: i64,
    pub extra_data: String,
    pub signature: String,
}

impl PaymentCallback {
    pub fn target_status(&self) -> BookingStatus {
        if self.result_code == 0 {
            BookingStatus::Confirmed
        } else {
            BookingStatus::Cancelled
        }
    }

    /// Fields in the order the gateway hashes an IPN.
    fn signature_payload(&self, access_key: &str) -> String {
        format!(
            "accessKey={access_key}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}\
             &orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}\
             &resultCode={}&transId={}",
            self.amount,
            self.extra_data,
            self.message,
            self.order_id,
            self.order_info,
            self.order_type,
            self.partner_code,
            self.pay_type,
            self.request_id,
            self.response_time,
            self.result_code,
            self.trans_id,
        )
    }
}

/// Hex HMAC-SHA256 of `raw` keyed by `secret`.
pub fn sign(secret: &str, raw: &str) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Signing(e.to_string()))?;
    mac.update(raw.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex HMAC-SHA256 `signature` over `raw`.
pub fn verify(secret: &str, raw: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// The gateway amount: whole currency units.
fn amount_of(booking: &Booking) -> i64 {
    booking.total_cost.round() as i64
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    partner_code: &'a str,
    partner_name: &'a str,
    store_id: &'a str,
    request_id: &'a str,
    amount: i64,
    order_id: String,
    order_info: &'a str,
    redirect_url: &'a str,
    ipn_url: &'a str,
    lang: &'a str,
    request_type: &'a str,
    auto_capture: bool,
    extra_data: &'a str,
    order_group_id: &'a str,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    result_code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    pay_url: Option<String>,
}

/// MoMo v2 "create" API client.
pub struct MomoGateway {
    config: PaymentConfig,
    client: reqwest::Client,
}

impl MomoGateway {
    pub fn new(config: PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { config, client })
    }

    /// Fields in the order the gateway hashes them.
    fn signature_payload(&self, amount: i64, order_id: &str, request_id: &str) -> String {
        let c = &self.config;
        format!(
            "accessKey={}&amount={amount}&extraData=&ipnUrl={}&orderId={order_id}&orderInfo={}\
             &partnerCode={}&redirectUrl={}&requestId={request_id}&requestType={}",
            c.access_key,
            c.ipn_url,
            PaymentConfig::ORDER_INFO,
            c.partner_code,
            c.redirect_url,
            PaymentConfig::REQUEST_TYPE,
        )
    }

    fn request<'a>(
        &'a self,
        booking: &Booking,
        request_id: &'a str,
    ) -> Result<CreateRequest<'a>, PaymentError> {
        let c = &self.config;
        let amount = amount_of(booking);
        let order_id = booking.id.to_string();
        let signature = sign(
            &c.secret_key,
            &self.signature_payload(amount, &order_id, request_id),
        )?;
        Ok(CreateRequest {
            partner_code: &c.partner_code,
            partner_name: "Innkeep",
            store_id: "InnkeepStore",
            request_id,
            amount,
            order_id,
            order_info: PaymentConfig::ORDER_INFO,
            redirect_url: &c.redirect_url,
            ipn_url: &c.ipn_url,
            lang: PaymentConfig::LANG,
            request_type: PaymentConfig::REQUEST_TYPE,
            auto_capture: true,
            extra_data: "",
            order_group_id: "",
            signature,
        })
    }
}

#[async_trait]
impl PaymentGateway for MomoGateway {
    async fn create_session(&self, booking: &Booking) -> Result<PaymentSession, PaymentError> {
        let request_id = format!("{}{}", self.config.partner_code, now_ms());
        let body = self.request(booking, &request_id)?;
        debug!("opening payment session {request_id} for booking {}", booking.id);

        let response: CreateResponse = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        match response {
            CreateResponse {
                result_code: 0,
                pay_url: Some(pay_url),
                ..
            } => Ok(PaymentSession {
                pay_url,
                request_id,
            }),
            CreateResponse {
                result_code,
                message,
                ..
            } => {
                warn!("gateway refused booking {}: {result_code} {message}", booking.id);
                Err(PaymentError::Rejected {
                    result_code,
                    message,
                })
            }
        }
    }

    fn verify_callback(&self, callback: &PaymentCallback) -> bool {
        let c = &self.config;
        callback.partner_code == c.partner_code
            && verify(
                &c.secret_key,
                &callback.signature_payload(&c.access_key),
                &callback.signature,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn config() -> PaymentConfig {
        PaymentConfig {
            endpoint: "https://test-payment.momo.vn/v2/gateway/api/create".into(),
            partner_code: "MOMO".into(),
            access_key: "F8BBA842ECF85".into(),
            secret_key: "K951B6PE1waDMi640xX08PD3vg6EkVlz".into(),
            ipn_url: "https://hotel.example.com/api/bookings/momo-webhook".into(),
            redirect_url: "https://hotel.example.com/profile".into(),
        }
    }

    fn booking() -> Booking {
        Booking {
            id: Ulid::from_string("01J0000000000000000000000B").unwrap(),
            user: UserSnapshot {
                id: Ulid::new(),
                username: "lan".into(),
                email: "lan@example.com".into(),
                phone: "0900000000".into(),
            },
            room: RoomSnapshot {
                id: Ulid::new(),
                name: "Ocean 101".into(),
                price: 1_000_000.0,
                discount: 10.0,
            },
            room_type: "Deluxe".into(),
            check_in: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            total_cost: 1_800_000.0,
            status: BookingStatus::Pending,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn hmac_matches_reference_vector() {
        assert_eq!(
            sign("key", "The quick brown fox jumps over the lazy dog").unwrap(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn signature_covers_fields_in_gateway_order() {
        let gw = MomoGateway::new(config()).unwrap();
        let raw = gw.signature_payload(1_800_000, "01J0000000000000000000000B", "MOMO1717200000000");
        assert_eq!(
            raw,
            "accessKey=F8BBA842ECF85&amount=1800000&extraData=\
             &ipnUrl=https://hotel.example.com/api/bookings/momo-webhook\
             &orderId=01J0000000000000000000000B&orderInfo=Pay with MoMo&partnerCode=MOMO\
             &redirectUrl=https://hotel.example.com/profile&requestId=MOMO1717200000000\
             &requestType=payWithMethod"
        );

        let body = gw.request(&booking(), "MOMO1717200000000").unwrap();
        assert_eq!(
            body.signature,
            "73870be6bed35423df6c27314274744d6e4e29e52df933438e801f07adb72154"
        );
        assert_eq!(body.amount, 1_800_000);
        assert_eq!(body.order_id, "01J0000000000000000000000B");
    }

    #[test]
    fn request_body_is_camel_case() {
        let gw = MomoGateway::new(config()).unwrap();
        let body = gw.request(&booking(), "MOMO1").unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["partnerCode"], "MOMO");
        assert_eq!(json["requestType"], "payWithMethod");
        assert_eq!(json["ipnUrl"], "https://hotel.example.com/api/bookings/momo-webhook");
        assert_eq!(json["autoCapture"], true);
    }

    fn signed_callback(gw: &MomoGateway, result_code: i64) -> PaymentCallback {
        let mut cb = PaymentCallback {
            partner_code: "MOMO".into(),
            order_id: "01J0000000000000000000000B".into(),
            request_id: "MOMO1717200000000".into(),
            amount: 1_800_000,
            order_info: PaymentConfig::ORDER_INFO.into(),
            order_type: "momo_wallet".into(),
            trans_id: 4_088_878_653,
            result_code,
            message: "Successful.".into(),
            pay_type: "qr".into(),
            response_time: 1_717_200_030_000,
            ..PaymentCallback::default()
        };
        let raw = cb.signature_payload(&gw.config.access_key);
        cb.signature = sign(&gw.config.secret_key, &raw).unwrap();
        cb
    }

    #[test]
    fn callback_signature_is_checked() {
        let gw = MomoGateway::new(config()).unwrap();
        let cb = signed_callback(&gw, 0);
        assert!(gw.verify_callback(&cb));

        // Flipping the outcome invalidates the signature.
        let mut forged = cb.clone();
        forged.result_code = 1006;
        assert!(!gw.verify_callback(&forged));

        let mut unsigned = cb.clone();
        unsigned.signature = String::new();
        assert!(!gw.verify_callback(&unsigned));

        let mut garbage = cb;
        garbage.signature = "zz".into();
        assert!(!gw.verify_callback(&garbage));
    }

    #[test]
    fn ipn_payload_order() {
        let gw = MomoGateway::new(config()).unwrap();
        let cb = signed_callback(&gw, 0);
        assert_eq!(
            cb.signature_payload("AK"),
            "accessKey=AK&amount=1800000&extraData=&message=Successful.\
             &orderId=01J0000000000000000000000B&orderInfo=Pay with MoMo&orderType=momo_wallet\
             &partnerCode=MOMO&payType=qr&requestId=MOMO1717200000000\
             &responseTime=1717200030000&resultCode=0&transId=4088878653"
        );
    }

    #[test]
    fn callback_result_codes() {
        let ok: PaymentCallback =
            serde_json::from_str(r#"{"orderId":"x","resultCode":0,"amount":1800000}"#).unwrap();
        assert_eq!(ok.target_status(), BookingStatus::Confirmed);
        let failed: PaymentCallback =
            serde_json::from_str(r#"{"orderId":"x","resultCode":1006}"#).unwrap();
        assert_eq!(failed.target_status(), BookingStatus::Cancelled);
    }
}
