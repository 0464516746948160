//! Transport to the storefront cart API.

use std::future::Future;

use reqwest::{Client, RequestBuilder, Response, header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use shopline_core::cart::CartView;
use shopline_core::{CartLineId, ProductId};

use crate::error::ApiError;

/// Cart operations the cache needs from the server.
///
/// Every call returns the server's cart after the operation.
pub trait CartApi: Send + Sync {
    fn get_cart(&self) -> impl Future<Output = Result<CartView, ApiError>> + Send;

    fn add_line(
        &self,
        product_id: ProductId,
        quantity: i32,
    ) -> impl Future<Output = Result<CartView, ApiError>> + Send;

    fn set_quantity(
        &self,
        line_id: CartLineId,
        quantity: i32,
    ) -> impl Future<Output = Result<CartView, ApiError>> + Send;

    fn remove_line(
        &self,
        line_id: CartLineId,
    ) -> impl Future<Output = Result<CartView, ApiError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<CartView, ApiError>> + Send;
}

#[derive(Serialize)]
struct AddLineBody {
    product_id: ProductId,
    quantity: i32,
}

#[derive(Serialize)]
struct SetQuantityBody {
    quantity: i32,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`CartApi`] over HTTP, authenticated with the storefront session cookie.
#[derive(Clone)]
pub struct HttpCartApi {
    client: Client,
    base_url: Url,
    session_cookie: SecretString,
}

impl std::fmt::Debug for HttpCartApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartApi")
            .field("base_url", &self.base_url.as_str())
            .field("session_cookie", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpCartApi {
    /// Create a client for the storefront at `base_url`.
    ///
    /// `session_cookie` is sent verbatim as the `Cookie` header, e.g.
    /// `shopline_session=...`.
    #[must_use]
    pub fn new(client: Client, base_url: Url, session_cookie: SecretString) -> Self {
        Self {
            client,
            base_url,
            session_cookie,
        }
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Transport(format!("invalid URL {path}: {e}")))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(header::COOKIE, self.session_cookie.expose_secret())
    }

    async fn send(&self, request: RequestBuilder) -> Result<CartView, ApiError> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        read_cart(response).await
    }
}

async fn read_cart(response: Response) -> Result<CartView, ApiError> {
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        return Err(ApiError::from_status(status.as_u16(), message));
    }

    response.json::<CartView>().await.map_err(|e| {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    })
}

impl CartApi for HttpCartApi {
    #[instrument(skip(self))]
    async fn get_cart(&self) -> Result<CartView, ApiError> {
        let url = self.url("api/cart")?;
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add_line(&self, product_id: ProductId, quantity: i32) -> Result<CartView, ApiError> {
        let url = self.url("api/cart/lines")?;
        self.send(self.client.post(url).json(&AddLineBody {
            product_id,
            quantity,
        }))
        .await
    }

    #[instrument(skip(self), fields(line_id = %line_id))]
    async fn set_quantity(
        &self,
        line_id: CartLineId,
        quantity: i32,
    ) -> Result<CartView, ApiError> {
        let url = self.url(&format!("api/cart/lines/{line_id}"))?;
        self.send(self.client.patch(url).json(&SetQuantityBody { quantity }))
            .await
    }

    #[instrument(skip(self), fields(line_id = %line_id))]
    async fn remove_line(&self, line_id: CartLineId) -> Result<CartView, ApiError> {
        let url = self.url(&format!("api/cart/lines/{line_id}"))?;
        self.send(self.client.delete(url)).await
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<CartView, ApiError> {
        let url = self.url("api/cart")?;
        self.send(self.client.delete(url)).await
    }
}
