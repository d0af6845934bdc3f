//! 세그먼트 정의 (wire 단위)
//!
//! - 데이터 세그먼트: seq_num >= 0, ack_num = -1, 페이로드 최대 DATA_LENGTH
//! - ACK 세그먼트: seq_num = -1, ack_num >= 0, 빈 페이로드
//!
//! 체크섬은 seq_num, ack_num, 페이로드 전체에 대한 CRC32

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::SEQUENCE_SENTINEL;

/// 시퀀스 번호 (세그먼트 인덱스, 0부터 시작)
pub type SeqNum = u32;

/// 세그먼트 헤더
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentHeader {
    /// 시퀀스 번호 (ACK 세그먼트면 -1)
    pub seq_num: i32,

    /// ACK 번호 (데이터 세그먼트면 -1)
    pub ack_num: i32,

    /// CRC32 체크섬
    pub checksum: u32,
}

/// 세그먼트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// 데이터 세그먼트
    Data(SeqNum),

    /// ACK 세그먼트 (수신측이 아직 필요로 하는 시퀀스 번호)
    Ack(SeqNum),

    /// 둘 다 아니거나 둘 다인 세그먼트
    Malformed,
}

/// 세그먼트 (채널 전송 단위)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub header: SegmentHeader,
    pub payload: Bytes,
}

impl Segment {
    /// 데이터 세그먼트 생성
    pub fn data(seq: SeqNum, payload: Bytes) -> Self {
        debug_assert!(seq <= i32::MAX as SeqNum, "seq {} exceeds wire range", seq);
        Self::with_fields(seq as i32, SEQUENCE_SENTINEL, payload)
    }

    /// ACK 세그먼트 생성
    pub fn ack(ack: SeqNum) -> Self {
        debug_assert!(ack <= i32::MAX as SeqNum, "ack {} exceeds wire range", ack);
        Self::with_fields(SEQUENCE_SENTINEL, ack as i32, Bytes::new())
    }

    fn with_fields(seq_num: i32, ack_num: i32, payload: Bytes) -> Self {
        let checksum = checksum(seq_num, ack_num, &payload);
        Self {
            header: SegmentHeader {
                seq_num,
                ack_num,
                checksum,
            },
            payload,
        }
    }

    /// 체크섬 검증
    pub fn verify(&self) -> bool {
        checksum(self.header.seq_num, self.header.ack_num, &self.payload) == self.header.checksum
    }

    /// 세그먼트 종류 판별
    pub fn kind(&self) -> SegmentKind {
        let SegmentHeader {
            seq_num, ack_num, ..
        } = self.header;

        match (seq_num, ack_num) {
            (seq, SEQUENCE_SENTINEL) if seq >= 0 => SegmentKind::Data(seq as SeqNum),
            (SEQUENCE_SENTINEL, ack) if ack >= 0 && self.payload.is_empty() => {
                SegmentKind::Ack(ack as SeqNum)
            }
            _ => SegmentKind::Malformed,
        }
    }

    /// 세그먼트를 바이트로 직렬화
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// 바이트에서 세그먼트 역직렬화
    ///
    /// 체크섬은 검증하지 않음 (수신 엔진이 `verify`로 판단)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let segment: Segment = bincode::deserialize(bytes)?;

        // 뒤에 남는 바이트가 있으면 프레임 경계가 깨진 것
        if bincode::serialized_size(&segment)? != bytes.len() as u64 {
            return Err(Error::MalformedSegment { len: bytes.len() });
        }

        Ok(segment)
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "seq: {}, ack: {}, checksum: {:08X}, data: {:?}",
            self.header.seq_num,
            self.header.ack_num,
            self.header.checksum,
            String::from_utf8_lossy(&self.payload)
        )
    }
}

/// CRC32 over seq_num, ack_num, payload
pub(crate) fn checksum(seq_num: i32, ack_num: i32, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&seq_num.to_le_bytes());
    hasher.update(&ack_num.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

/// 세그먼트 생성기 (송신측)
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    data_length: usize,
}

impl SegmentBuilder {
    pub fn new(data_length: usize) -> Self {
        Self { data_length }
    }

    /// 데이터를 DATA_LENGTH 단위 페이로드로 분할 (복사 없이 slice)
    pub fn split_payload(&self, data: &Bytes) -> Vec<Bytes> {
        if self.data_length == 0 {
            return Vec::new();
        }

        (0..data.len())
            .step_by(self.data_length)
            .map(|offset| data.slice(offset..(offset + self.data_length).min(data.len())))
            .collect()
    }
}
