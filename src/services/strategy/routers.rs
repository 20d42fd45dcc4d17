// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract UniV2Router {
        function WETH() external pure returns (address);
        function factory() external pure returns (address);
        function swapExactETHForTokens(uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) payable returns (uint256[] memory amounts);
        function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) returns (uint256[] memory amounts);
    }

    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract UniversalRouter {
        function execute(bytes commands, bytes[] inputs) external payable;
    }

    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract UniversalRouterDeadline {
        function execute(bytes commands, bytes[] inputs, uint256 deadline) external payable;
    }

    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract UniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }

    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract Erc20 {
        function approve(address spender, uint256 amount) external returns (bool);
    }
}
