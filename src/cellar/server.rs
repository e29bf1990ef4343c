//! HTTP marshalling for the sommelier resource.
//!
//! `POST /sommelier` with a JSON or YAML body such as
//! `{"winery": "Longoria", "varietal": ["Merlot"]}`.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::cellar::sommelier::{Criteria, PickError, Sommelier, StoredBottle, Winery};
use crate::http::{
    decode_request, Error, Handler, HandlerError, HandlerResult, ResponseWriter, Service,
    ServiceError, Unmarshaler,
};

pub const PICK_PATH: &str = "/sommelier";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PickRequestBody {
    pub name: Option<String>,
    pub varietal: Option<Vec<String>>,
    pub winery: Option<String>,
}

impl From<PickRequestBody> for Criteria {
    fn from(body: PickRequestBody) -> Self {
        Criteria {
            name: body.name,
            varietal: body.varietal.unwrap_or_default(),
            winery: body.winery,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WineryResponseBody {
    pub name: String,
    pub region: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<Winery> for WineryResponseBody {
    fn from(w: Winery) -> Self {
        Self {
            name: w.name,
            region: w.region,
            country: w.country,
            url: w.url,
        }
    }
}

/// One element of the pick response; the composition is left out of the
/// collection view.
#[derive(Debug, Clone, Serialize)]
pub struct StoredBottleResponseBody {
    pub id: String,
    pub name: String,
    pub winery: WineryResponseBody,
    pub vintage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u32>,
}

impl From<StoredBottle> for StoredBottleResponseBody {
    fn from(b: StoredBottle) -> Self {
        Self {
            id: b.id,
            name: b.name,
            winery: b.winery.into(),
            vintage: b.vintage,
            rating: b.rating,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PickErrorBody {
    pub name: &'static str,
    pub message: String,
}

/// Decode the pick request body into [`Criteria`] stored as the payload.
pub fn decode_pick_request() -> Unmarshaler {
    Unmarshaler::new(|ctx, req| {
        let body: PickRequestBody = decode_request(ctx, req)?;
        req.set_payload(Criteria::from(body));
        Ok(())
    })
}

pub fn encode_pick_response(rw: &ResponseWriter, bottles: Vec<StoredBottle>) -> HandlerResult {
    let body: Vec<StoredBottleResponseBody> = bottles.into_iter().map(Into::into).collect();
    rw.send(StatusCode::OK, &body).map_err(HandlerError::opaque)
}

pub fn encode_pick_error(rw: &ResponseWriter, err: PickError) -> HandlerResult {
    let (status, name) = match &err {
        PickError::NoCriteria(_) => (StatusCode::BAD_REQUEST, "no_criteria"),
        PickError::NoMatch(_) => (StatusCode::NOT_FOUND, "no_match"),
    };
    let body = PickErrorBody {
        name,
        message: err.to_string(),
    };
    rw.send(status, &body).map_err(HandlerError::opaque)
}

/// Mount the sommelier controller on `service`.
pub fn mount(service: &Service, sommelier: Arc<Sommelier>) -> Result<(), ServiceError> {
    let ctrl = service.new_controller("sommelier");
    let pick = Handler::new(move |_ctx, rw, req| {
        let sommelier = sommelier.clone();
        async move {
            let criteria = req
                .payload::<Criteria>()
                .ok_or_else(Error::missing_payload)?;
            match sommelier.pick(criteria) {
                Ok(bottles) => encode_pick_response(&rw, bottles),
                Err(err) => encode_pick_error(&rw, err),
            }
        }
    });
    service.handle(
        Method::POST,
        PICK_PATH,
        ctrl.mux_handler("pick", pick, Some(decode_pick_request())),
    )
}
