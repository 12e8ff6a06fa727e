/*!

# Networking Interfaces and Methods

## Introduction

Clearline nodes speak a minimalistic JSON RPC over websockets. The
connection is full-duplex: the same socket carries responses to our
requests and server-initiated notifications, which is important for
things like balance-update pushes.

## Clearline RPC

Every message is one JSON object, a request or a response:

```json
{"req": [id, method, params, timestamp], "sig": ["..."]}
{"res": [id, method, result, timestamp], "sig": ["..."]}
```

`id` is used to match requests to responses, similar to the ID in
JSON-RPC: unique per connection lifetime, monotonically increasing,
never reused. `method` is the name of the procedure the sender wishes
to invoke. `params` is an arbitrary JSON object whose form depends on
the method. `timestamp` is milliseconds since the unix epoch.

`sig` carries zero or more hex signatures over the serialized `req`
tuple; an empty list means an unsigned request.

## Responses

A response echoes the request id. The special method name `error`
signals an application-level failure; its result carries a
human-readable message (in `result.error`, or as a bare string).

## Notifications

A response envelope whose id matches no outstanding request is a
notification. Notifications use short method tags:

```text
bu      balance update
cu      channel update
tr      transfer
su      session update
```

## Authentication

Signed application calls require an authenticated session, established
by the `auth_request` / `auth_verify` handshake. `auth_request` names
the handshake domain and the session parameters and is answered with a
challenge; `auth_verify` proves control of the identity key by
returning the signed challenge. See `networking::auth` for the fallback
cascade across domains and signing strategies.

*/

pub mod auth;
pub mod client;
pub mod correlator;
pub mod envelope;
pub mod notifications;
pub mod transport;
