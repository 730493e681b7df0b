// Exchange lifecycle:
//
//            send_response()
//   Open ─────────────────────────────────────────────► Responded
//    │ │                                                  ▲
//    │ │ send_delayed_ack()        send_response()        │
//    │ └──────────────► DelayedAckSent ───────────────────┘
//    │   (CON only,       (empty ACK out,       (response out as a new CON
//    │    NON: no-op)      response now CON)      via Dispatcher::submit)
//    │
//    │ send_reset_response()
//    └──────────────────────────────────────────────────► Reset
//
// Responded and Reset are terminal. Any further terminal action, or any
// access to the response, fails with Error::ExchangeClosed.

use std::net::SocketAddr;

use crate::eventlog::EventLogger;
use crate::message::{Code, Message, MessageType, Method, Options, Token, TransportContext};
use crate::Error;

const DELAYED_RESPONSE_FAILED: &str = "CoAP delayed response failed";

/// The network side of an exchange.
///
/// Implemented once per transport binding. The exchange hands finished
/// messages over by value and never does I/O itself.
pub trait Dispatcher {
    /// Transmit a message that belongs to the transaction of the original
    /// request (piggybacked ACK, NON response, empty ACK, Reset).
    fn send_response(&mut self, remote: SocketAddr, message: Message) -> Result<(), Error>;

    /// Transmit a standalone message and forget about it.
    ///
    /// The dispatcher owns message id assignment and retransmission. Only
    /// transport level failures are reported.
    fn submit(&mut self, remote: SocketAddr, message: Message) -> Result<(), Error>;
}

/// Where an exchange is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Response not sent yet.
    Open,
    /// Empty ACK sent, the response will follow as a separate CON.
    DelayedAckSent,
    /// Response sent (or deliberately not sent). Terminal.
    Responded,
    /// Reset sent. Terminal.
    Reset,
}

/// One inbound request and the response being built for it.
#[derive(Debug)]
pub struct Exchange {
    remote: SocketAddr,
    request: Message,
    /// Cleared once the response left the exchange.
    response: Option<Message>,
    state: ExchangeState,
    is_delayed_response: bool,
    events: EventLogger,
}

impl Exchange {
    /// Create an exchange with an explicit response draft.
    pub fn new(
        remote: SocketAddr,
        request: Message,
        response: Message,
        events: EventLogger,
    ) -> Self {
        Exchange {
            remote,
            request,
            response: Some(response),
            state: ExchangeState::Open,
            is_delayed_response: false,
            events,
        }
    }

    /// Create an exchange with the default response skeleton of `request`.
    pub fn from_request(remote: SocketAddr, request: Message, events: EventLogger) -> Self {
        let response = request.create_response();
        Self::new(remote, request, response, events)
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn is_delayed_response(&self) -> bool {
        self.is_delayed_response
    }

    pub fn request(&self) -> &Message {
        &self.request
    }

    /// Source address of the request.
    pub fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    pub fn request_method(&self) -> Option<Method> {
        self.request.method()
    }

    /// Requested path, `/` when the request has no Uri-Path.
    pub fn request_uri(&self) -> String {
        self.request.options().uri_path()
    }

    pub fn request_headers(&self) -> &Options {
        self.request.options()
    }

    pub fn request_body(&self) -> &[u8] {
        self.request.payload()
    }

    pub fn request_body_string(&self) -> String {
        self.request.payload_string()
    }

    pub fn request_transport_context(&self) -> Option<&TransportContext> {
        self.request.transport_context()
    }

    /// The response draft. Fails once the response was sent.
    pub fn response(&self) -> Result<&Message, Error> {
        self.response.as_ref().ok_or(Error::ExchangeClosed(self.state))
    }

    fn response_mut(&mut self) -> Result<&mut Message, Error> {
        self.response.as_mut().ok_or(Error::ExchangeClosed(self.state))
    }

    pub fn response_headers(&self) -> Result<&Options, Error> {
        Ok(self.response()?.options())
    }

    pub fn response_headers_mut(&mut self) -> Result<&mut Options, Error> {
        Ok(self.response_mut()?.options_mut())
    }

    pub fn set_response_body(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.response_mut()?.set_payload(payload);
        Ok(())
    }

    /// UTF-8 encodes `body` and sets it as payload.
    pub fn set_response_body_str(&mut self, body: &str) -> Result<(), Error> {
        self.set_response_body(body.as_bytes())
    }

    pub fn set_response_content_type(&mut self, content_format: u16) -> Result<(), Error> {
        self.response_mut()?
            .options_mut()
            .set_content_format(content_format);
        Ok(())
    }

    pub fn set_response_token(&mut self, token: Token) -> Result<(), Error> {
        self.response_mut()?.set_token(token);
        Ok(())
    }

    pub fn response_token(&self) -> Result<&Token, Error> {
        Ok(self.response()?.token())
    }

    pub fn set_response_code(&mut self, code: Code) -> Result<(), Error> {
        self.response_mut()?.set_code(Some(code));
        Ok(())
    }

    /// Replace the whole response draft.
    pub fn set_response(&mut self, message: Message) -> Result<(), Error> {
        *self.response_mut()? = message;
        Ok(())
    }

    pub fn response_transport_context(&self) -> Result<Option<&TransportContext>, Error> {
        Ok(self.response()?.transport_context())
    }

    pub fn set_response_transport_context(
        &mut self,
        ctx: Option<TransportContext>,
    ) -> Result<(), Error> {
        self.response_mut()?.set_transport_context(ctx);
        Ok(())
    }

    /// Send the response. Must be the last call on this exchange.
    ///
    /// On a fresh exchange this is the piggybacked path: ACK for a CON
    /// request, NON for a NON request. A NON message without method gets no
    /// response at all. If the dispatcher refuses the response, the draft is
    /// kept and the exchange stays Open so it can be answered again.
    ///
    /// After [`send_delayed_ack`](Self::send_delayed_ack) the response goes
    /// out as a separate CON through [`Dispatcher::submit`]. The peer already
    /// has its ACK, so a transport failure there is logged and swallowed.
    pub fn send_response<D: Dispatcher>(&mut self, dispatcher: &mut D) -> Result<(), Error> {
        match self.state {
            ExchangeState::Open => self.send_direct(dispatcher),
            ExchangeState::DelayedAckSent => {
                self.send_separate(dispatcher);
                Ok(())
            }
            ExchangeState::Responded | ExchangeState::Reset => {
                Err(Error::ExchangeClosed(self.state))
            }
        }
    }

    fn send_direct<D: Dispatcher>(&mut self, dispatcher: &mut D) -> Result<(), Error> {
        if self.request.message_type() == MessageType::NonConfirmable
            && self.request.method().is_none()
        {
            trace!("Send response ignored for NON response: {}", self.request);
            self.response = None;
            self.state = ExchangeState::Responded;
            return Ok(());
        }

        let response = self.take_response()?;

        // The draft stays with the exchange until the dispatcher accepted it.
        if let Err(e) = dispatcher.send_response(self.remote, response.clone()) {
            self.response = Some(response);
            return Err(e);
        }

        self.state = ExchangeState::Responded;
        Ok(())
    }

    fn send_separate<D: Dispatcher>(&mut self, dispatcher: &mut D) {
        self.state = ExchangeState::Responded;

        // The state is DelayedAckSent, so the response is present.
        let Some(response) = self.response.take() else {
            return;
        };

        if let Err(e) = dispatcher.submit(self.remote, response) {
            warn!("Error while sending delayed response: {}", e);
            self.events
                .warn(DELAYED_RESPONSE_FAILED, Some(self.remote), &e);
        }
    }

    /// Acknowledge the request now and respond later.
    ///
    /// Sends an empty ACK echoing the request's message id. The response
    /// draft is kept, switched to Confirmable, and goes out on the next
    /// [`send_response`](Self::send_response).
    ///
    /// A NON request expects no ACK; then this is a no-op and the exchange
    /// stays Open.
    pub fn send_delayed_ack<D: Dispatcher>(&mut self, dispatcher: &mut D) -> Result<(), Error> {
        if self.state != ExchangeState::Open {
            return Err(Error::ExchangeClosed(self.state));
        }
        if self.request.message_type() == MessageType::NonConfirmable {
            return Ok(());
        }

        // Moved out while the ACK is in flight, the ACK cannot touch it.
        let mut pending = self.take_response()?;

        let empty_ack = Message::empty_ack(self.request.message_id());
        if let Err(e) = dispatcher.send_response(self.remote, empty_ack) {
            self.response = Some(pending);
            return Err(e);
        }

        pending.set_message_type(MessageType::Confirmable);
        self.response = Some(pending);
        self.is_delayed_response = true;
        self.state = ExchangeState::DelayedAckSent;

        Ok(())
    }

    /// Reject the request with a Reset.
    ///
    /// Nothing changes when the dispatcher refuses the Reset.
    pub fn send_reset_response<D: Dispatcher>(
        &mut self,
        dispatcher: &mut D,
    ) -> Result<(), Error> {
        if self.state != ExchangeState::Open {
            return Err(Error::ExchangeClosed(self.state));
        }

        let reset = self.request.create_reset();
        dispatcher.send_response(self.remote, reset)?;

        self.response = None;
        self.state = ExchangeState::Reset;
        Ok(())
    }

    fn take_response(&mut self) -> Result<Message, Error> {
        self.response.take().ok_or(Error::ExchangeClosed(self.state))
    }
}
