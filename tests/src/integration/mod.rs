//! Integration tests over real loopback TCP.

#[cfg(test)]
mod harness;

#[cfg(test)]
mod confidential;
#[cfg(test)]
mod persistence;
#[cfg(test)]
mod reconciliation;
